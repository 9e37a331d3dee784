use flate2::write::GzEncoder;
use flate2::Compression;
use runtime_launcher::{
    Error, Fetcher, RecoveryPolicy, RegistryStore, Settings, SharedLog, Supervisor,
    SupervisorOptions,
};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A request as seen by the mock API server.
#[derive(Debug, Clone)]
struct SeenRequest {
    path: String,
    headers: HashMap<String, String>,
}

/// Minimal stand-in for the GitHub tarball endpoint.
///
/// Routes map a request path to a tarball body; anything else is a 404.
struct MockGithub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockGithub {
    async fn start(routes: HashMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&buf).to_string();
                    let mut lines = head.split("\r\n");
                    let path = lines
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let headers = lines
                        .filter_map(|l| l.split_once(": "))
                        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                        .collect();
                    seen.lock().unwrap().push(SeenRequest {
                        path: path.clone(),
                        headers,
                    });

                    let (status, body) = match routes.get(&path) {
                        Some(body) => ("200 OK", body.clone()),
                        None => ("404 Not Found", b"{\"message\":\"Not Found\"}".to_vec()),
                    };
                    let head = format!(
                        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Build a gzipped tarball wrapping `files` in a `root/` folder, the way
/// GitHub does.
fn tarball(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut dir_header = tar::Header::new_gnu();
    dir_header.set_entry_type(tar::EntryType::Directory);
    dir_header.set_size(0);
    dir_header.set_mode(0o755);
    dir_header.set_cksum();
    builder
        .append_data(&mut dir_header, format!("{}/", root), std::io::empty())
        .unwrap();

    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", root, name), contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

fn settings_for(mock: &MockGithub, work: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.projects_dir = work.join("projects");
    settings.registry_file = work.join("registry.json");
    settings.log_file = work.join("logs.txt");
    settings.github.api_base = mock.base_url();
    settings.github.token = Some("test-token".to_string());
    settings
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn fetch_strips_root_folder_and_authenticates() {
    let routes = HashMap::from([(
        "/repos/acme/widget/tarball".to_string(),
        tarball(
            "acme-widget-1a2b3c4",
            &[
                ("index.js", "require('http').createServer().listen(process.env.PORT)"),
                ("package.json", "{\"name\":\"widget\"}"),
                ("lib/util.js", "module.exports = {}"),
            ],
        ),
    )]);
    let mock = MockGithub::start(routes).await;
    let work = tempfile::tempdir().unwrap();
    let settings = settings_for(&mock, work.path());

    let fetcher = Fetcher::new(&settings).unwrap();
    let dir = fetcher
        .fetch("https://github.com/acme/widget.git", "widget")
        .await
        .unwrap();

    assert_eq!(dir, work.path().join("projects").join("widget"));
    assert_eq!(list_dir(&dir), vec!["index.js", "lib", "package.json"]);
    assert_eq!(
        fs::read_to_string(dir.join("package.json")).unwrap(),
        "{\"name\":\"widget\"}"
    );
    assert!(dir.join("lib/util.js").is_file());

    // Only the unpacked directory is left behind.
    assert_eq!(list_dir(&settings.projects_dir), vec!["widget"]);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/repos/acme/widget/tarball");
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some("token test-token")
    );
    assert!(requests[0]
        .headers
        .get("user-agent")
        .is_some_and(|ua| ua.starts_with("runtime-launcher/")));
}

#[tokio::test]
async fn second_fetch_replaces_first() {
    let routes = HashMap::from([
        (
            "/repos/acme/widget/tarball/v1".to_string(),
            tarball("acme-widget-v1", &[("old.txt", "old")]),
        ),
        (
            "/repos/acme/widget/tarball/v2".to_string(),
            tarball("acme-widget-v2", &[("new.txt", "new")]),
        ),
    ]);
    let mock = MockGithub::start(routes).await;
    let work = tempfile::tempdir().unwrap();
    let settings = settings_for(&mock, work.path());

    let first = Fetcher::new(&settings)
        .unwrap()
        .with_ref(Some("v1".to_string()));
    let dir = first
        .fetch("https://github.com/acme/widget", "widget")
        .await
        .unwrap();
    assert_eq!(list_dir(&dir), vec!["old.txt"]);
    fs::write(dir.join("scratch.log"), "local edits").unwrap();

    let second = Fetcher::new(&settings)
        .unwrap()
        .with_ref(Some("v2".to_string()));
    let dir = second
        .fetch("https://github.com/acme/widget", "widget")
        .await
        .unwrap();
    assert_eq!(list_dir(&dir), vec!["new.txt"]);
}

#[tokio::test]
async fn missing_repository_is_a_fetch_error() {
    let mock = MockGithub::start(HashMap::new()).await;
    let work = tempfile::tempdir().unwrap();
    let settings = settings_for(&mock, work.path());

    let fetcher = Fetcher::new(&settings).unwrap();
    let err = fetcher
        .fetch("https://github.com/acme/missing", "missing")
        .await
        .unwrap_err();

    match &err {
        Error::Fetch { status, reason } => {
            assert_eq!(*status, 404);
            assert_eq!(reason, "Not Found");
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
    assert!(err.suggestion().is_some());

    // The destination was recreated empty and no temp archive is left.
    let dest = settings.projects_dir.join("missing");
    assert!(dest.is_dir());
    assert!(list_dir(&dest).is_empty());
    assert!(!settings.projects_dir.join("missing.tar.gz").exists());
}

#[tokio::test]
async fn fetched_snapshot_can_be_launched_and_stopped() {
    let routes = HashMap::from([(
        "/repos/acme/widget/tarball".to_string(),
        tarball("acme-widget-abc", &[("index.js", "// server")]),
    )]);
    let mock = MockGithub::start(routes).await;
    let work = tempfile::tempdir().unwrap();
    let settings = settings_for(&mock, work.path());

    let dir = Fetcher::new(&settings)
        .unwrap()
        .fetch("https://github.com/acme/widget", "widget")
        .await
        .unwrap();

    let store = RegistryStore::open(&settings.registry_file, RecoveryPolicy::Empty).unwrap();
    let supervisor = Supervisor::new(
        Arc::new(store),
        Arc::new(SharedLog::new(&settings.log_file)),
        SupervisorOptions {
            launch_command: "sleep 30".to_string(),
            ..SupervisorOptions::from(&settings)
        },
    );

    supervisor.launch("widget", &dir).await.unwrap();
    let list = supervisor.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "widget");
    assert!(list[0].alive);
    assert!((9000..=9899).contains(&list[0].port));

    assert!(supervisor.stop("widget").await.unwrap());
    assert!(supervisor.list().is_empty());

    let exit = tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for_exit("widget"))
        .await
        .unwrap();
    assert!(exit.is_some());
}
