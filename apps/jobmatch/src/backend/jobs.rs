use async_trait::async_trait;
use serde_json::json;

use super::{BackendClient, Listing};
use crate::errors::ClientError;
use crate::models::jobs::{Application, JobSummary, SavedJobRecord};

/// Mutation and listing endpoints the job board drives. Each mutation is a
/// single external call; locking is the caller's job.
#[async_trait]
pub trait JobActions: Send + Sync {
    async fn withdraw_application(&self, application_id: &str) -> Result<(), ClientError>;

    async fn apply(&self, job_id: &str, resume_id: &str) -> Result<(), ClientError>;

    async fn save_job(&self, job_id: &str) -> Result<(), ClientError>;

    async fn unsave_job(&self, job_id: &str) -> Result<(), ClientError>;

    async fn list_applications(&self) -> Result<Vec<Application>, ClientError>;

    async fn list_saved_jobs(&self) -> Result<Vec<JobSummary>, ClientError>;
}

pub struct HttpJobActions {
    client: BackendClient,
}

impl HttpJobActions {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobActions for HttpJobActions {
    async fn withdraw_application(&self, application_id: &str) -> Result<(), ClientError> {
        self.client
            .delete(&format!("applications/{application_id}/"))
            .await
    }

    async fn apply(&self, job_id: &str, resume_id: &str) -> Result<(), ClientError> {
        self.client
            .post(
                &format!("jobs/{job_id}/apply/"),
                Some(&json!({ "cv_id": resume_id })),
            )
            .await
    }

    async fn save_job(&self, job_id: &str) -> Result<(), ClientError> {
        self.client
            .post(&format!("jobs/{job_id}/save/"), None::<&()>)
            .await
    }

    async fn unsave_job(&self, job_id: &str) -> Result<(), ClientError> {
        self.client.delete(&format!("jobs/{job_id}/save/")).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ClientError> {
        let listing: Listing<Application> = self.client.get_json("my-applications/", &[]).await?;
        Ok(listing.into_vec())
    }

    async fn list_saved_jobs(&self) -> Result<Vec<JobSummary>, ClientError> {
        let listing: Listing<SavedJobRecord> = self.client.get_json("jobs/saved/", &[]).await?;
        Ok(listing.into_vec().into_iter().map(|r| r.job).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn actions_for(server: &MockServer) -> HttpJobActions {
        HttpJobActions::new(BackendClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_apply_posts_resume_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs/j1/apply/"))
            .and(body_json(json!({"cv_id": "cv_v1"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        actions_for(&server).apply("j1", "cv_v1").await.unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_server_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/applications/a1/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = actions_for(&server)
            .withdraw_application("a1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_saved_jobs_unwraps_nested_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/saved/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "s1", "job": {"id": "j1", "title": "SRE"}}]
            })))
            .mount(&server)
            .await;

        let saved = actions_for(&server).list_saved_jobs().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "j1");
        assert_eq!(saved[0].title.as_deref(), Some("SRE"));
    }

    #[tokio::test]
    async fn test_applications_accept_bare_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/my-applications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "a1", "job": {"id": "j1"}, "status": "pending"}
            ])))
            .mount(&server)
            .await;

        let apps = actions_for(&server).list_applications().await.unwrap();
        assert_eq!(apps[0].id, "a1");
        assert_eq!(apps[0].job.id, "j1");
        assert_eq!(apps[0].status.as_deref(), Some("pending"));
    }
}
