use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use log::warn;
use std::{
    fmt::Write as _,
    io::{self, Write},
};

use crate::{errors::SelectionError, utils::read_from_stdin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub number: usize,
    pub label: String,
}

/// A numbered list of choices presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub title: String,
    pub notice: Option<String>,
    pub entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notice: None,
            entries: Vec::new(),
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn push(&mut self, number: usize, label: impl Into<String>) {
        self.entries.push(MenuEntry {
            number,
            label: label.into(),
        });
    }

    pub fn contains(&self, choice: usize) -> bool {
        self.entries.iter().any(|entry| entry.number == choice)
    }

    /// `1` when the menu has such an option.
    pub fn default_choice(&self) -> Option<usize> {
        Some(1).filter(|choice| self.contains(*choice))
    }

    pub fn check(&self, choice: usize) -> std::result::Result<usize, SelectionError> {
        if self.contains(choice) {
            Ok(choice)
        } else {
            Err(SelectionError::InvalidChoice {
                choice,
                expected: self.expected(),
            })
        }
    }

    fn expected(&self) -> String {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => format!("{}..={}", first.number, last.number),
            _ => "nothing".to_owned(),
        }
    }

    pub fn render(&self) -> String {
        let mut rendered = String::new();
        let _ = writeln!(rendered, "{}", self.title.bold());
        if let Some(notice) = &self.notice {
            let _ = writeln!(rendered, "{}", notice.dimmed());
        }
        for entry in &self.entries {
            let _ = writeln!(rendered, "  {} - {}", entry.number, entry.label);
        }
        rendered
    }
}

/// Source of answers for interactive questions.
pub trait PromptProvider {
    /// Ask for a number from `menu`. Validating it against the menu is left to the caller.
    fn choose(&mut self, menu: &Menu) -> Result<usize>;

    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Ask for a line of text. An empty answer yields `default`, if any.
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String>;
}

/// Ask until the answer is one of the menu's options.
pub fn choose_valid(prompt: &mut dyn PromptProvider, menu: &Menu) -> Result<usize> {
    loop {
        let choice = prompt.choose(menu)?;
        match menu.check(choice) {
            Ok(choice) => return Ok(choice),
            Err(error) => warn!("{}", error),
        }
    }
}

/// Pick one of `options`, returning its index.
pub fn choose_from(
    prompt: &mut dyn PromptProvider,
    title: &str,
    options: &[&str],
) -> Result<usize> {
    let mut menu = Menu::new(title);
    for (index, option) in options.iter().enumerate() {
        menu.push(index + 1, *option);
    }
    Ok(choose_valid(prompt, &menu)? - 1)
}

/// Ask for text until a non-empty answer is given.
pub fn required_text(
    prompt: &mut dyn PromptProvider,
    message: &str,
    default: Option<&str>,
) -> Result<String> {
    loop {
        let answer = prompt.text(message, default)?;
        if !answer.trim().is_empty() {
            return Ok(answer.trim().to_owned());
        }
        warn!("{} cannot be empty.", message);
    }
}

/// Prompts on the terminal: menus and questions go to stderr, answers come from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl PromptProvider for TerminalPrompt {
    fn choose(&mut self, menu: &Menu) -> Result<usize> {
        write!(io::stderr(), "{}", menu.render()).context("Failed to write menu to stderr.")?;
        let default = menu.default_choice().map(|choice| choice.to_string());
        loop {
            let answer = read_from_stdin("Choose", default.as_deref())?;
            match answer.parse::<usize>() {
                Ok(choice) => return Ok(choice),
                Err(_) => warn!("`{}` is not a number.", answer),
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .interact()
            .context("Failed to read confirmation.")
    }

    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        read_from_stdin(message, default)
    }
}
