use anyhow::{anyhow, Result};

use crate::prompt::PromptProvider;

pub mod config;
pub mod deploy;
pub mod environment;
pub mod experiment;
pub mod init;
pub mod pod_operator;

/// Ask before an operation that writes to the user's cloud resources, unless `yes` was given.
pub fn ensure_user_confirms(
    prompt: &mut dyn PromptProvider,
    message: &str,
    yes: bool,
) -> Result<()> {
    if yes || prompt.confirm(message)? {
        Ok(())
    } else {
        Err(anyhow!("Operation aborted by user"))
    }
}

#[cfg(test)]
mod tests {
    use super::ensure_user_confirms;
    use crate::prompt::testing::ScriptedPrompt;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ensure_user_confirms() {
        let mut prompt = ScriptedPrompt::default().then_confirm(false);
        let error = ensure_user_confirms(&mut prompt, "Upload?", false).unwrap_err();
        assert_eq!(error.to_string(), "Operation aborted by user");

        let mut prompt = ScriptedPrompt::default();
        ensure_user_confirms(&mut prompt, "Upload?", true).unwrap();
    }
}
