//! How external backup producers upload to a project.

pub struct IntegrationGuide {
    base_url: String,
    project_id: String,
}

impl IntegrationGuide {
    pub fn new(base_url: &str, project_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            project_id: project_id.to_owned(),
        }
    }

    pub fn backup_endpoint(&self) -> String {
        format!("{}/api/backup", self.base_url)
    }

    /// Command that lists the keys this upload can authenticate with.
    pub fn access_keys_hint(&self) -> String {
        format!("backupmonitor-cli keys {}", self.project_id)
    }

    pub fn generic_sample(&self) -> String {
        format!(
            "curl -X POST \"{}\" -F \"file=@my-awesome-backup.zip\"",
            self.backup_endpoint()
        )
    }

    pub fn header_auth_sample(&self) -> String {
        format!(
            "curl -X POST \"{}\" \\\n     -H \"Authorization: $YOUR_ACCESS_KEY\" \\\n     -F \"file=@my-awesome-backup.zip\"",
            self.backup_endpoint()
        )
    }

    pub fn query_auth_sample(&self) -> String {
        format!(
            "curl -X POST \"{}?key=$YOUR_ACCESS_KEY\" \\\n     -F \"file=@my-awesome-backup.zip\"",
            self.backup_endpoint()
        )
    }

    pub fn created_response(&self) -> String {
        let body = "{\n   \"id\" : \"0123456789abcdef\",\n   \"filename\" : \"my-awesome-backup.zip\",\n   \"type\" : \"last\",\n   \"time\" : \"2020-01-01T12:00:00Z\"\n}";
        format!(
            "HTTP/1.1 201 Created\nLocation: {}/0123456789abcdef\nContent-Type: application/json\nContent-Length: {}\n\n{}",
            self.backup_endpoint(),
            body.len(),
            body
        )
    }

    pub fn bad_request_response(&self) -> String {
        error_response("400 Bad Request", "bad_request", "not a multipart form")
    }

    pub fn forbidden_response(&self) -> String {
        error_response("403 Forbidden", "access_denied", "access denied")
    }

    pub fn render(&self) -> String {
        [
            format!("Upload endpoint: {}", self.backup_endpoint()),
            format!("Access keys: {}", self.access_keys_hint()),
            String::new(),
            "Upload a backup file:".to_owned(),
            self.generic_sample(),
            String::new(),
            "Authenticate with a header:".to_owned(),
            self.header_auth_sample(),
            String::new(),
            "Authenticate with a query parameter:".to_owned(),
            self.query_auth_sample(),
            String::new(),
            "On success:".to_owned(),
            self.created_response(),
            String::new(),
            "On a malformed request:".to_owned(),
            self.bad_request_response(),
            String::new(),
            "On an invalid access key:".to_owned(),
            self.forbidden_response(),
        ]
        .join("\n")
    }
}

fn error_response(status: &str, code: &str, message: &str) -> String {
    let body = format!("{{\n    \"error\" : \"{code}\",\n    \"message\" : \"{message}\"\n}}");
    format!(
        "HTTP/1.1 {status}\nContent-Type: application/json\nContent-Length: {}\n\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_point_at_upload_endpoint() {
        let guide = IntegrationGuide::new("https://backup.example.com/", "db-main");
        assert_eq!(guide.backup_endpoint(), "https://backup.example.com/api/backup");
        assert!(guide
            .query_auth_sample()
            .starts_with("curl -X POST \"https://backup.example.com/api/backup?key="));
        assert!(guide.access_keys_hint().ends_with("keys db-main"));
    }

    #[test]
    fn error_samples_carry_matching_length() {
        let guide = IntegrationGuide::new("http://localhost:8000", "db-main");
        let response = guide.forbidden_response();
        let (head, body) = response.split_once("\n\n").unwrap();
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        assert!(body.contains("access_denied"));
    }
}
