//! Webhook command builders
//!
//! The webhook API exposes a single path, `/webhook/{apiKey}`. The operation
//! is selected by the HTTP verb plus a handful of custom headers, so each
//! browser-facing operation is a pure function producing a [`WebhookCommand`].

use bytes::Bytes;
use reqwest::Method;
use serde_json::{json, Value};

use crate::models::Network;
use crate::proxy::credentials::Credentials;

pub const SECRET_KEY: &str = "secret-key";
pub const GROUP_ID: &str = "group-id";
pub const NETWORK: &str = "network";
pub const HASH: &str = "hash";
pub const STAMP_IMMEDIATELY: &str = "stamp-immediately";
pub const EXPORT_LINKS: &str = "export-links";

#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub enum CommandBody {
    Empty,
    Json(Value),
    File(FilePart),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    pub stamp_immediately: Option<bool>,
    pub export_links: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct WebhookCommand {
    pub method: Method,
    pub headers: Vec<(&'static str, String)>,
    pub body: CommandBody,
}

impl WebhookCommand {
    fn new(method: Method, credentials: &Credentials, network: Network) -> Self {
        Self {
            method,
            headers: vec![
                (SECRET_KEY, credentials.secret_key.clone()),
                (NETWORK, network.to_string()),
            ],
            body: CommandBody::Empty,
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn body(mut self, body: CommandBody) -> Self {
        self.body = body;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header names only, for logging
    pub fn header_names(&self) -> Vec<&'static str> {
        self.headers.iter().map(|(n, _)| *n).collect()
    }
}

pub fn list_groups(credentials: &Credentials) -> WebhookCommand {
    WebhookCommand::new(Method::GET, credentials, credentials.network)
}

pub fn list_files(credentials: &Credentials, group_id: &str) -> WebhookCommand {
    WebhookCommand::new(Method::GET, credentials, credentials.network).header(GROUP_ID, group_id)
}

pub fn file_info(credentials: &Credentials, hash: &str) -> WebhookCommand {
    WebhookCommand::new(Method::GET, credentials, credentials.network).header(HASH, hash)
}

/// Marker upload that creates an empty group
pub fn create_group(credentials: &Credentials, group_id: &str, network: Network) -> WebhookCommand {
    WebhookCommand::new(Method::POST, credentials, network)
        .header(GROUP_ID, group_id)
        .body(CommandBody::Json(json!({})))
}

pub fn upload_file(
    credentials: &Credentials,
    group_id: &str,
    network: Network,
    file: FilePart,
    options: UploadOptions,
) -> WebhookCommand {
    let mut command = WebhookCommand::new(Method::POST, credentials, network)
        .header(GROUP_ID, group_id)
        .body(CommandBody::File(file));
    if let Some(stamp) = options.stamp_immediately {
        command = command.header(STAMP_IMMEDIATELY, stamp.to_string());
    }
    if let Some(export) = options.export_links {
        command = command.header(EXPORT_LINKS, export.to_string());
    }
    command
}

/// DELETE with the hash in a JSON body
pub fn delete_file(credentials: &Credentials, group_id: &str, file_hash: &str) -> WebhookCommand {
    WebhookCommand::new(Method::DELETE, credentials, credentials.network)
        .header(GROUP_ID, group_id)
        .body(CommandBody::Json(json!({ "file_hash": file_hash })))
}

pub fn stamp_collection(credentials: &Credentials, group_id: &str, network: Network) -> WebhookCommand {
    WebhookCommand::new(Method::PATCH, credentials, network).header(GROUP_ID, group_id)
}

/// HEAD; the answer is in the `X-*` response headers
pub fn group_stats(credentials: &Credentials, group_id: &str) -> WebhookCommand {
    WebhookCommand::new(Method::HEAD, credentials, credentials.network).header(GROUP_ID, group_id)
}

pub fn tenant_stats(credentials: &Credentials) -> WebhookCommand {
    WebhookCommand::new(Method::HEAD, credentials, credentials.network)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("key123", "s3cret", Network::Private)
    }

    #[test]
    fn every_command_carries_secret_and_network() {
        let c = creds();
        let commands = [
            list_groups(&c),
            list_files(&c, "g1"),
            file_info(&c, "h1"),
            delete_file(&c, "g1", "h1"),
            group_stats(&c, "g1"),
            tenant_stats(&c),
        ];
        for cmd in &commands {
            assert_eq!(cmd.header_value(SECRET_KEY), Some("s3cret"));
            assert_eq!(cmd.header_value(NETWORK), Some("private"));
        }
    }

    #[test]
    fn reads_are_distinguished_by_headers() {
        let c = creds();
        let groups = list_groups(&c);
        assert_eq!(groups.method, Method::GET);
        assert_eq!(groups.header_value(GROUP_ID), None);
        assert_eq!(groups.header_value(HASH), None);

        let files = list_files(&c, "Photos");
        assert_eq!(files.header_value(GROUP_ID), Some("Photos"));

        let info = file_info(&c, "bafyhash");
        assert_eq!(info.header_value(HASH), Some("bafyhash"));
        assert_eq!(info.header_value(GROUP_ID), None);
    }

    #[test]
    fn delete_sends_hash_in_body() {
        let cmd = delete_file(&creds(), "g1", "h1");
        assert_eq!(cmd.method, Method::DELETE);
        assert_eq!(cmd.header_value(GROUP_ID), Some("g1"));
        match cmd.body {
            CommandBody::Json(v) => assert_eq!(v, json!({"file_hash": "h1"})),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn group_creation_is_an_empty_json_post_on_requested_network() {
        let cmd = create_group(&creds(), "New", Network::Public);
        assert_eq!(cmd.method, Method::POST);
        assert_eq!(cmd.header_value(NETWORK), Some("public"));
        assert!(matches!(cmd.body, CommandBody::Json(ref v) if v == &json!({})));
    }

    #[test]
    fn upload_options_become_headers() {
        let file = FilePart {
            file_name: "a.txt".into(),
            content_type: Some("text/plain".into()),
            bytes: Bytes::from_static(b"hi"),
        };
        let cmd = upload_file(
            &creds(),
            "g1",
            Network::Public,
            file.clone(),
            UploadOptions { stamp_immediately: Some(true), export_links: None },
        );
        assert_eq!(cmd.header_value(STAMP_IMMEDIATELY), Some("true"));
        assert_eq!(cmd.header_value(EXPORT_LINKS), None);

        let plain = upload_file(&creds(), "g1", Network::Public, file, UploadOptions::default());
        assert_eq!(plain.header_value(STAMP_IMMEDIATELY), None);
        assert!(matches!(plain.body, CommandBody::File(_)));
    }

    #[test]
    fn stats_use_head() {
        assert_eq!(group_stats(&creds(), "g").method, Method::HEAD);
        assert_eq!(tenant_stats(&creds()).method, Method::HEAD);
        assert_eq!(stamp_collection(&creds(), "g", Network::All).method, Method::PATCH);
        assert_eq!(
            stamp_collection(&creds(), "g", Network::All).header_value(NETWORK),
            Some("all")
        );
    }

    #[test]
    fn header_names_never_include_values() {
        let names = list_files(&creds(), "g1").header_names();
        assert_eq!(names, vec![SECRET_KEY, NETWORK, GROUP_ID]);
    }
}
