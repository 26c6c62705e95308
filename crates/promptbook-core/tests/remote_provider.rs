//! Integration tests for the HTTP provider against a local stub server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use promptbook_core::{
    Cell, CellKind, CellRef, CellStatus, Engine, LlmProvider, Notebook, Output, ProviderConfig,
    ProviderError, ProviderKind, RemoteProvider, Value,
};

/// Captured request: request line, lowercase headers and body.
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Serve exactly one request with `status` and `body`, returning what was received.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
            }
        }

        let length: usize = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let mut buf = vec![0u8; length];
        reader.read_exact(&mut buf).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(buf).unwrap(),
        }
    });

    (base_url, handle)
}

#[test]
fn test_successful_completion() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"id": "chatcmpl-1", "choices": [{"index": 0, "message": {"role": "assistant", "content": "Ownership moves values."}}]}"#,
    );

    let provider = RemoteProvider::new("sk-test", Some(&base_url), "gpt-4").unwrap();
    let text = provider
        .generate("Explain ownership", "gpt-4", 0.3, Some(64))
        .unwrap();
    assert_eq!(text, "Ownership moves values.");

    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "POST /v1/chat/completions HTTP/1.1");
    assert_eq!(captured.header("authorization"), Some("Bearer sk-test"));

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["model"], "gpt-4");
    assert_eq!(body["max_tokens"], 64);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Explain ownership");
}

#[test]
fn test_unauthorized_maps_to_authentication() {
    let (base_url, server) = serve_once(
        "401 Unauthorized",
        r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
    );

    let provider = RemoteProvider::new("sk-bad", Some(&base_url), "gpt-4").unwrap();
    let err = provider.generate("hi", "gpt-4", 0.7, None).unwrap_err();
    assert_eq!(
        err,
        ProviderError::Authentication("Incorrect API key provided".into())
    );

    let captured = server.join().unwrap();
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert!(body.get("max_tokens").is_none());
}

#[test]
fn test_server_error_maps_to_api_error() {
    let (base_url, server) = serve_once("503 Service Unavailable", r#"{"error": {"message": "overloaded"}}"#);

    let provider = RemoteProvider::new("sk-test", Some(&base_url), "gpt-4").unwrap();
    let err = provider.generate("hi", "gpt-4", 0.7, None).unwrap_err();
    assert_eq!(
        err,
        ProviderError::Api {
            status: 503,
            message: "overloaded".into()
        }
    );
    server.join().unwrap();
}

#[test]
fn test_connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = RemoteProvider::new("sk-test", Some(&format!("http://{addr}/v1")), "gpt-4").unwrap();
    let err = provider.generate("hi", "gpt-4", 0.7, None).unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
}

#[test]
fn test_prompt_cell_through_remote_provider() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"choices": [{"message": {"role": "assistant", "content": "Hi Ada!"}}]}"#,
    );

    let config = ProviderConfig {
        kind: ProviderKind::Remote,
        model: "gpt-4o-mini".into(),
        base_url: Some(base_url),
        ..ProviderConfig::default()
    };
    let engine = Engine::new(config, Some("sk-explicit")).unwrap();

    let mut notebook = Notebook::new("remote");
    notebook.add_cell(Cell::new(CellKind::Memory, "name = 'Ada'"));
    notebook.add_cell(Cell::new(CellKind::Prompt, "Greet {name}"));
    engine.execute_all(&mut notebook);

    let cell = &notebook.cells()[1];
    assert_eq!(cell.status(), CellStatus::Success);
    assert_eq!(
        notebook.state().get(&cell.response_key()),
        Some(&Value::from("Hi Ada!"))
    );
    assert!(matches!(
        &cell.outputs()[0],
        Output::LlmResponse { prompt, response, model }
            if prompt == "Greet Ada" && response == "Hi Ada!" && model == "gpt-4o-mini"
    ));

    let captured = server.join().unwrap();
    assert_eq!(captured.header("authorization"), Some("Bearer sk-explicit"));

    let status = engine.execute_cell(&mut notebook, &CellRef::Index(1)).unwrap();
    assert_eq!(status, CellStatus::Error);
}
