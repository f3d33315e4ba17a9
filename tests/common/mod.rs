use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

pub enum MockResponse {
    Json(serde_json::Value),
    /// 200 whose `Set-Cookie` headers carry an access/refresh token pair.
    LoginCookies(serde_json::Value, &'static str, &'static str),
    /// Arbitrary error status with a FastAPI-style JSON body.
    Status(u16, serde_json::Value),
    Unauthorized,
    Ok,
}

impl MockResponse {
    pub fn into_http_string(self) -> String {
        match self {
            MockResponse::Json(val) => {
                let body = serde_json::to_string(&val).unwrap();
                format!(
                    "HTTP/1.1 200 OK\r\n\
                     Content-Type: application/json\r\n\
                     Connection: close\r\n\
                     Content-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                )
            }
            MockResponse::LoginCookies(val, access, refresh) => {
                let body = serde_json::to_string(&val).unwrap();
                format!(
                    "HTTP/1.1 200 OK\r\n\
                     Content-Type: application/json\r\n\
                     Set-Cookie: access_token={}; HttpOnly; Path=/\r\n\
                     Set-Cookie: refresh_token={}; HttpOnly; Path=/\r\n\
                     Connection: close\r\n\
                     Content-Length: {}\r\n\r\n{}",
                    access,
                    refresh,
                    body.len(),
                    body
                )
            }
            MockResponse::Status(code, val) => {
                let reason = match code {
                    400 => "Bad Request",
                    401 => "Unauthorized",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    _ => "Error",
                };
                let body = serde_json::to_string(&val).unwrap();
                format!(
                    "HTTP/1.1 {} {}\r\n\
                     Content-Type: application/json\r\n\
                     Connection: close\r\n\
                     Content-Length: {}\r\n\r\n{}",
                    code,
                    reason,
                    body.len(),
                    body
                )
            }
            MockResponse::Unauthorized => "HTTP/1.1 401 Unauthorized\r\n\
                 Connection: close\r\n\
                 Content-Length: 0\r\n\r\n"
                .to_string(),
            MockResponse::Ok => "HTTP/1.1 200 OK\r\n\
                 Connection: close\r\n\
                 Content-Length: 0\r\n\r\n"
                .to_string(),
        }
    }
}

/// Serve the scripted responses in order, one connection each, and hand
/// back the captured requests (headers plus body) on join.
pub fn spawn_scripted_server(
    responses: Vec<MockResponse>,
) -> (String, std::thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let mut reqs = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            reqs.push(read_full_request(&mut stream));
            let resp = response.into_http_string();
            stream.write_all(resp.as_bytes()).unwrap();
        }
        reqs
    });

    (format!("http://{}", addr), handle)
}

/// Read one request through the end of its body, so tests can assert on
/// POST payloads and not just the request line.
fn read_full_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let needed = content_length(&buf[..pos]);
            if buf.len() >= pos + 4 + needed {
                break;
            }
        }
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// JSON body of a captured request.
pub fn body_of(req: &str) -> serde_json::Value {
    let body = req.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
    serde_json::from_str(body).unwrap()
}

fn content_length(headers: &[u8]) -> usize {
    let text = String::from_utf8_lossy(headers);
    text.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

pub struct TestHarness {
    pub tempdir: TempDir,
    pub server_url: String,
    server_handle: Option<std::thread::JoinHandle<Vec<String>>>,
}

impl TestHarness {
    pub fn new(script: Vec<MockResponse>) -> Self {
        let tempdir = TempDir::new().expect("create tempdir");
        let (server_url, server_handle) = spawn_scripted_server(script);
        Self {
            tempdir,
            server_url,
            server_handle: Some(server_handle),
        }
    }

    /// Harness without a server, for commands that never hit the backend.
    pub fn new_no_server() -> Self {
        let tempdir = TempDir::new().expect("create tempdir");
        Self {
            tempdir,
            server_url: "http://localhost:0".to_string(),
            server_handle: None,
        }
    }

    pub fn run_cli_and_assert_success(&mut self, args: &[&str]) -> (Output, Vec<String>) {
        let output = self.run_cli(args);
        let requests = self.join_server();

        if !output.status.success() {
            eprintln!(
                "=== CLI STDOUT ===\n{}",
                String::from_utf8_lossy(&output.stdout)
            );
            eprintln!(
                "=== CLI STDERR ===\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
            eprintln!("=== SERVER REQUESTS ===");
            for (i, r) in requests.iter().enumerate() {
                eprintln!("--- Request {} ---\n{}\n", i, r);
            }
            panic!("CLI failed unexpectedly");
        }

        (output, requests)
    }

    pub fn run_cli(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_farewatch"));
        cmd.env("FAREWATCH_CONFIG_DIR", self.tempdir.path());
        cmd.env("FAREWATCH_API", &self.server_url);
        cmd.args(args);
        cmd.output().expect("run farewatch cli")
    }

    pub fn join_server(&mut self) -> Vec<String> {
        if let Some(handle) = self.server_handle.take() {
            handle.join().unwrap()
        } else {
            Vec::new()
        }
    }

    pub fn session_path(&self) -> std::path::PathBuf {
        self.tempdir.path().join("farewatch").join("session.json")
    }

    pub fn create_session(
        &self,
        email: &str,
        access: &str,
        refresh: Option<&str>,
        access_exp: Option<u64>,
    ) {
        let dir = self.tempdir.path().join("farewatch");
        fs::create_dir_all(&dir).unwrap();
        let session = json!({
            "email": email,
            "access_token": access,
            "refresh_token": refresh,
            "access_exp": access_exp,
        });
        fs::write(
            dir.join("session.json"),
            serde_json::to_vec_pretty(&session).unwrap(),
        )
        .unwrap();
    }

    pub fn create_future_session(&self) {
        let exp = now_epoch() + 3600;
        self.create_session(
            "tester@example.com",
            "test-access",
            Some("test-refresh"),
            Some(exp),
        );
    }

    pub fn create_expired_session(&self) {
        let exp = now_epoch() - 10;
        self.create_session(
            "tester@example.com",
            "expired-access",
            Some("test-refresh"),
            Some(exp),
        );
    }
}

fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
