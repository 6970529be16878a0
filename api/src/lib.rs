#![deny(clippy::all)]
mod error;
pub mod resources;
pub mod retry;

use http::Method;
use log::debug;
use once_cell::sync::Lazy;
use reqwest::{
    blocking::{Client as HttpClient, Response as HttpResponse},
    header::{self, HeaderMap, HeaderValue},
    IntoUrl, Proxy, Result as ReqwestResult,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Display, time::Duration};
use url::Url;

use crate::{
    resources::{
        bucket::ListBucketsResponse,
        environment::ListEnvironmentsResponse,
        object::UploadQuery,
        project::ListProjectsResponse,
        Response,
    },
    retry::{Retrier, RetryConfig},
};

pub use crate::{
    error::{Error, Result},
    resources::{
        bucket::{Bucket, BucketName, NewBucket, StorageUri},
        environment::{Environment, EnvironmentConfig, EnvironmentPath, EnvironmentState},
        object::Object,
        project::{NewProject, Operation, Project, ProjectId},
        Page,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token(pub String);

/// Base URLs of the Google APIs the client talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub resource_manager: Url,
    pub storage: Url,
    pub composer: Url,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            resource_manager: DEFAULT_RESOURCE_MANAGER_ENDPOINT.clone(),
            storage: DEFAULT_STORAGE_ENDPOINT.clone(),
            composer: DEFAULT_COMPOSER_ENDPOINT.clone(),
        }
    }
}

pub struct Config {
    pub endpoints: ApiEndpoints,
    pub token: Token,
    pub proxy: Option<Url>,
    /// Retry settings to use, if any. This will apply to all requests except for POST requests
    /// which are not idempotent (as they cannot be naively retried).
    pub retry_config: Option<RetryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoints: ApiEndpoints::default(),
            token: Token("".to_owned()),
            proxy: None,
            retry_config: None,
        }
    }
}

#[derive(Debug)]
pub struct Client {
    endpoints: Endpoints,
    http_client: HttpClient,
    headers: HeaderMap,
    retrier: Option<Retrier>,
}

#[derive(Serialize)]
struct PageQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    #[serde(rename = "pageToken", skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Serialize)]
struct ProjectQuery<'a> {
    project: &'a str,
}

impl Client {
    /// Create a new API client.
    pub fn new(config: Config) -> Result<Client> {
        let http_client = build_http_client(&config)?;
        let headers = build_headers(&config)?;
        let endpoints = Endpoints::new(config.endpoints)?;
        let retrier = config.retry_config.map(Retrier::new);
        Ok(Client {
            endpoints,
            http_client,
            headers,
            retrier,
        })
    }

    /// List one page of the projects visible to the caller.
    pub fn get_projects_page(&self, page_token: Option<&str>) -> Result<Page<Project>> {
        let response = self.get_query::<_, _, ListProjectsResponse>(
            self.endpoints.projects.clone(),
            Some(&PageQuery {
                project: None,
                page_token,
            }),
        )?;
        Ok(Page::new(response.projects, response.next_page_token))
    }

    /// Get a project by id.
    pub fn get_project(&self, project_id: &ProjectId) -> Result<Project> {
        self.get(self.endpoints.project_by_id(project_id)?)
    }

    /// Request the creation of a new project. Creation completes asynchronously.
    pub fn create_project(&self, project: NewProject<'_>) -> Result<Operation> {
        self.post(self.endpoints.projects.clone(), project, Retry::No)
    }

    /// List one page of the buckets belonging to `project_id`.
    pub fn get_buckets_page(
        &self,
        project_id: &ProjectId,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>> {
        let response = self.get_query::<_, _, ListBucketsResponse>(
            self.endpoints.buckets.clone(),
            Some(&PageQuery {
                project: Some(&project_id.0),
                page_token,
            }),
        )?;
        Ok(Page::new(response.items, response.next_page_token))
    }

    /// Get a bucket by name.
    pub fn get_bucket(&self, bucket_name: &BucketName) -> Result<Bucket> {
        self.get(self.endpoints.bucket_by_name(bucket_name)?)
    }

    /// Create a new bucket in `project_id`.
    pub fn create_bucket(&self, project_id: &ProjectId, bucket: NewBucket<'_>) -> Result<Bucket> {
        self.request(
            &Method::POST,
            &self.endpoints.buckets.clone(),
            &Some(bucket),
            &Some(ProjectQuery {
                project: &project_id.0,
            }),
            &Retry::No,
        )
    }

    /// List one page of the Composer environments of a project in a location.
    pub fn get_environments_page(
        &self,
        project_id: &ProjectId,
        location: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Environment>> {
        let response = self.get_query::<_, _, ListEnvironmentsResponse>(
            self.endpoints.environments(project_id, location)?,
            Some(&PageQuery {
                project: None,
                page_token,
            }),
        )?;
        Ok(Page::new(response.environments, response.next_page_token))
    }

    /// Get a Composer environment by its full resource path.
    pub fn get_environment(&self, environment_path: &EnvironmentPath) -> Result<Environment> {
        self.get(self.endpoints.environment(environment_path)?)
    }

    /// Upload `body` as object `object_name` in `bucket_name`, replacing any existing object.
    pub fn upload_object(
        &self,
        bucket_name: &BucketName,
        object_name: &str,
        body: Vec<u8>,
    ) -> Result<Object> {
        let url = self.endpoints.upload(bucket_name)?;
        debug!("Attempting POST `{}` (object `{}`)", url, object_name);
        let query = UploadQuery {
            upload_type: "media",
            name: object_name,
        };
        let http_response = self
            .with_retries(|| {
                self.http_client
                    .post(url.clone())
                    .headers(self.headers.clone())
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .query(&query)
                    .body(body.clone())
                    .send()
            })
            .map_err(|source| Error::ReqwestError {
                source,
                message: "Upload operation failed.".to_owned(),
            })?;
        parse_response(http_response)
    }

    fn get<LocationT, SuccessT>(&self, url: LocationT) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        SuccessT: DeserializeOwned,
    {
        self.request(&Method::GET, &url, &None::<()>, &None::<()>, &Retry::Yes)
    }

    fn get_query<LocationT, QueryT, SuccessT>(
        &self,
        url: LocationT,
        query: Option<&QueryT>,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        QueryT: Serialize,
        SuccessT: DeserializeOwned,
    {
        self.request(&Method::GET, &url, &None::<()>, &query, &Retry::Yes)
    }

    fn post<LocationT, RequestT, SuccessT>(
        &self,
        url: LocationT,
        request: RequestT,
        retry: Retry,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        SuccessT: DeserializeOwned,
    {
        self.request(&Method::POST, &url, &Some(request), &None::<()>, &retry)
    }

    fn raw_request<LocationT, RequestT, QueryT>(
        &self,
        method: &Method,
        url: &LocationT,
        body: &Option<RequestT>,
        query: &Option<QueryT>,
        retry: &Retry,
    ) -> Result<HttpResponse>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        QueryT: Serialize,
    {
        let do_request = || {
            let request = self
                .http_client
                .request(method.clone(), url.clone())
                .headers(self.headers.clone());
            let request = match &query {
                Some(query) => request.query(query),
                None => request,
            };
            let request = match &body {
                Some(body) => request.json(body),
                None => request,
            };
            request.send()
        };

        let result = match retry {
            Retry::Yes => self.with_retries(do_request),
            Retry::No => do_request(),
        };
        result.map_err(|source| Error::ReqwestError {
            source,
            message: format!("{method} operation failed."),
        })
    }

    fn request<LocationT, RequestT, SuccessT, QueryT>(
        &self,
        method: &Method,
        url: &LocationT,
        body: &Option<RequestT>,
        query: &Option<QueryT>,
        retry: &Retry,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        QueryT: Serialize,
        SuccessT: DeserializeOwned,
    {
        debug!("Attempting {} `{}`", method, url);
        let http_response = self.raw_request(method, url, body, query, retry)?;
        parse_response(http_response)
    }

    fn with_retries(
        &self,
        send_request: impl Fn() -> ReqwestResult<HttpResponse>,
    ) -> ReqwestResult<HttpResponse> {
        match &self.retrier {
            Some(retrier) => retrier.with_retries(send_request),
            None => send_request(),
        }
    }
}

fn parse_response<SuccessT: DeserializeOwned>(http_response: HttpResponse) -> Result<SuccessT> {
    let status = http_response.status();
    let body = http_response
        .text()
        .map_err(|source| Error::ReqwestError {
            source,
            message: "Could not read response body.".to_owned(),
        })?;

    match serde_json::from_str::<Response<SuccessT>>(&body) {
        Ok(response) => response.into_result(status),
        // Errors from the Google front end are not always JSON.
        Err(_) if !status.is_success() => Err(Error::Api {
            status_code: status,
            message: body.trim().to_owned(),
        }),
        Err(error) => Err(Error::BadJsonResponse(error)),
    }
}

#[derive(Copy, Clone)]
enum Retry {
    Yes,
    No,
}

#[derive(Debug)]
struct Endpoints {
    resource_manager: Url,
    storage: Url,
    composer: Url,
    projects: Url,
    buckets: Url,
}

fn construct_endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut endpoint = base.clone();

    let mut endpoint_segments = endpoint
        .path_segments_mut()
        .map_err(|_| Error::BadEndpoint {
            endpoint: base.clone(),
        })?;

    endpoint_segments.pop_if_empty();
    for segment in segments {
        endpoint_segments.push(segment);
    }

    drop(endpoint_segments);

    Ok(endpoint)
}

impl Endpoints {
    pub fn new(base: ApiEndpoints) -> Result<Self> {
        let projects = construct_endpoint(&base.resource_manager, &["v1", "projects"])?;
        let buckets = construct_endpoint(&base.storage, &["storage", "v1", "b"])?;

        Ok(Endpoints {
            resource_manager: base.resource_manager,
            storage: base.storage,
            composer: base.composer,
            projects,
            buckets,
        })
    }

    fn project_by_id(&self, project_id: &ProjectId) -> Result<Url> {
        construct_endpoint(&self.resource_manager, &["v1", "projects", &project_id.0])
    }

    fn bucket_by_name(&self, bucket_name: &BucketName) -> Result<Url> {
        construct_endpoint(&self.storage, &["storage", "v1", "b", &bucket_name.0])
    }

    fn upload(&self, bucket_name: &BucketName) -> Result<Url> {
        construct_endpoint(
            &self.storage,
            &["upload", "storage", "v1", "b", &bucket_name.0, "o"],
        )
    }

    fn environments(&self, project_id: &ProjectId, location: &str) -> Result<Url> {
        construct_endpoint(
            &self.composer,
            &[
                "v1",
                "projects",
                &project_id.0,
                "locations",
                location,
                "environments",
            ],
        )
    }

    fn environment(&self, environment_path: &EnvironmentPath) -> Result<Url> {
        let mut segments = vec!["v1"];
        segments.extend(environment_path.0.split('/'));
        construct_endpoint(&self.composer, &segments)
    }
}

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 120;

fn build_http_client(config: &Config) -> Result<HttpClient> {
    let mut builder =
        HttpClient::builder().timeout(Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS)));

    if let Some(proxy) = config.proxy.clone() {
        builder = builder.proxy(Proxy::all(proxy).map_err(Error::BuildHttpClient)?);
    }
    builder.build().map_err(Error::BuildHttpClient)
}

fn build_headers(config: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", &config.token.0)).map_err(|_| {
            Error::BadToken {
                token: config.token.0.clone(),
            }
        })?,
    );
    Ok(headers)
}

pub static DEFAULT_RESOURCE_MANAGER_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://cloudresourcemanager.googleapis.com").expect("Default URL is well-formed")
});
pub static DEFAULT_STORAGE_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://storage.googleapis.com").expect("Default URL is well-formed")
});
pub static DEFAULT_COMPOSER_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://composer.googleapis.com").expect("Default URL is well-formed")
});

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, server_url, Matcher};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_client() -> Client {
        let base = Url::parse(&server_url()).unwrap();
        Client::new(Config {
            endpoints: ApiEndpoints {
                resource_manager: base.clone(),
                storage: base.clone(),
                composer: base,
            },
            token: Token("test-token".to_owned()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_construct_endpoint() {
        let url = construct_endpoint(
            &Url::parse("https://composer.googleapis.com").unwrap(),
            &["v1", "projects", "repro-lab", "locations", "asia-northeast1"],
        )
        .unwrap();

        assert_eq!(
            url.to_string(),
            "https://composer.googleapis.com/v1/projects/repro-lab/locations/asia-northeast1"
        )
    }

    #[test]
    fn test_environment_endpoint() {
        let endpoints = Endpoints::new(ApiEndpoints::default()).unwrap();
        let path: EnvironmentPath = "projects/repro-lab/locations/asia-northeast1/environments/fuga"
            .parse()
            .unwrap();
        assert_eq!(
            endpoints.environment(&path).unwrap().to_string(),
            "https://composer.googleapis.com/v1/projects/repro-lab/locations/asia-northeast1/environments/fuga"
        );
        assert_eq!(
            endpoints
                .upload(&BucketName("my-bucket".to_owned()))
                .unwrap()
                .to_string(),
            "https://storage.googleapis.com/upload/storage/v1/b/my-bucket/o"
        );
    }

    #[test]
    fn test_get_projects_page() {
        let first = mock("GET", "/v1/projects")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "projects": [
                        {"projectId": "repro-lab", "name": "Repro Lab", "lifecycleState": "ACTIVE"},
                        {"projectId": "sandbox-123"}
                    ],
                    "nextPageToken": "page-2"
                })
                .to_string(),
            )
            .create();

        let page = test_client().get_projects_page(None).unwrap();
        first.assert();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].display_name(), "Repro Lab");
        assert_eq!(page.items[1].display_name(), "sandbox-123");
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
        drop(first);

        let second = mock("GET", "/v1/projects")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "page-2".into()))
            .with_status(200)
            .with_body(json!({}).to_string())
            .create();

        let page = test_client().get_projects_page(Some("page-2")).unwrap();
        second.assert();
        assert!(page.items.is_empty());
        assert_eq!(page.next_page_token, None);
    }

    #[test]
    fn test_get_buckets_page_is_scoped_to_project() {
        let buckets = mock("GET", "/storage/v1/b")
            .match_query(Matcher::UrlEncoded("project".into(), "repro-lab".into()))
            .with_status(200)
            .with_body(
                json!({
                    "kind": "storage#buckets",
                    "items": [{"id": "fuga-data", "name": "fuga-data", "location": "ASIA-NORTHEAST1"}]
                })
                .to_string(),
            )
            .create();

        let page = test_client()
            .get_buckets_page(&ProjectId("repro-lab".to_owned()), None)
            .unwrap();
        buckets.assert();
        assert_eq!(page.items[0].name, BucketName("fuga-data".to_owned()));
        assert_eq!(page.items[0].location, "ASIA-NORTHEAST1");
    }

    #[test]
    fn test_forbidden_is_credential_error() {
        let forbidden = mock("GET", "/v1/projects")
            .with_status(403)
            .with_body(
                json!({
                    "error": {
                        "code": 403,
                        "message": "Request had insufficient authentication scopes.",
                        "status": "PERMISSION_DENIED"
                    }
                })
                .to_string(),
            )
            .create();

        let error = test_client().get_projects_page(None).unwrap_err();
        forbidden.assert();
        assert!(error.is_credential_error());
    }

    #[test]
    fn test_non_json_error_body() {
        let unauthorized = mock("GET", "/storage/v1/b/missing-bucket")
            .with_status(401)
            .with_body("Unauthorized")
            .create();

        let error = test_client()
            .get_bucket(&BucketName("missing-bucket".to_owned()))
            .unwrap_err();
        unauthorized.assert();
        assert!(error.is_credential_error());
        assert_eq!(
            error.to_string(),
            "API request failed with 401 Unauthorized: Unauthorized"
        );
    }

    #[test]
    fn test_create_bucket() {
        let create = mock("POST", "/storage/v1/b")
            .match_query(Matcher::UrlEncoded("project".into(), "repro-lab".into()))
            .match_body(Matcher::Json(
                json!({"name": "fuga-new", "location": "asia-northeast1"}),
            ))
            .with_status(200)
            .with_body(
                json!({"id": "fuga-new", "name": "fuga-new", "location": "ASIA-NORTHEAST1"})
                    .to_string(),
            )
            .create();

        let bucket = test_client()
            .create_bucket(
                &ProjectId("repro-lab".to_owned()),
                NewBucket {
                    name: &BucketName("fuga-new".to_owned()),
                    location: "asia-northeast1",
                },
            )
            .unwrap();
        create.assert();
        assert_eq!(bucket.location, "ASIA-NORTHEAST1");
    }

    #[test]
    fn test_upload_object() {
        let upload = mock("POST", "/upload/storage/v1/b/dag-bucket/o")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "media".into()),
                Matcher::UrlEncoded("name".into(), "dags/exp/sql/train.sql".into()),
            ]))
            .match_body("select 1")
            .with_status(200)
            .with_body(
                json!({"name": "dags/exp/sql/train.sql", "bucket": "dag-bucket", "size": "8"})
                    .to_string(),
            )
            .create();

        let object = test_client()
            .upload_object(
                &BucketName("dag-bucket".to_owned()),
                "dags/exp/sql/train.sql",
                b"select 1".to_vec(),
            )
            .unwrap();
        upload.assert();
        assert_eq!(object.size.as_deref(), Some("8"));
    }
}
