//! End-to-end tests: real parser, fetcher and filesystem against a local
//! HTTP server, with the reload command recorded instead of executed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use edgeblock::cmd_abstraction::{CommandExecutor, CommandOutput};
use edgeblock::config::Settings;
use edgeblock::fs_abstraction::RealFileSystem;
use edgeblock::pipeline::{CycleReport, Mode, Pipeline};
use edgeblock::reader::StaticReader;
use edgeblock::SourceKind;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Records every command instead of running it.
#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingExecutor {
    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> anyhow::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((cmd.to_string(), args.to_vec()));
        Ok(CommandOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}

/// Serve fixed responses on 127.0.0.1 and return the base URL.
async fn serve(routes: Vec<(&'static str, u16, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, s, b)| (*s, *b))
                    .unwrap_or((404, ""));
                let reason = match status {
                    200 => "OK",
                    503 => "Service Unavailable",
                    _ => "Not Found",
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

const ADAWAY: &str = "# AdAway default blocklist\n127.0.0.1 localhost\n127.0.0.1 ads.example.com\n127.0.0.1 track.example.org\n";
const MALC0DE: &str = "// zones\nzone \"evil.example.net\"\nzone \"ad.doubleclick.net\"\nzone \"apple.com\"\n";

fn settings(dir: &Path, cores: usize) -> Settings {
    Settings {
        dir: dir.to_path_buf(),
        cores: Some(cores),
        ..Default::default()
    }
}

async fn run(
    settings: Settings,
    config: String,
    mode: Mode,
) -> (CycleReport, Arc<RecordingExecutor>) {
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = Pipeline::new(
        settings,
        Arc::new(StaticReader::new(config)),
        Arc::new(RealFileSystem),
        executor.clone(),
    )
    .unwrap();
    let report = pipeline.run_cycle(mode).await.unwrap();
    (report, executor)
}

fn read(path: PathBuf) -> String {
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{:?}: {}", path, e))
}

fn router_config(base: &str, adaway_disabled: bool, tasty: &Path) -> String {
    format!(
        r#"service {{
    dns {{
        forwarding {{
            cache-size 150
            blacklist {{
                disabled false
                dns-redirect-ip 0.0.0.0
                exclude apple.com
                exclude localhost
                domains {{
                    include adsrvr.org
                    include "*.doubleclick.net"
                    source malc0de {{
                        description "List of zones serving malicious executables"
                        prefix "zone "
                        url {base}/malc0de
                    }}
                    source broken {{
                        description "Always unavailable"
                        url {base}/down
                    }}
                }}
                hosts {{
                    dns-redirect-ip 192.168.1.1
                    source adaway {{
                        description "Blocking mobile ad providers"
                        disabled {adaway_disabled}
                        prefix "127.0.0.1 "
                        url {base}/adaway
                    }}
                    source tasty {{
                        description "File source"
                        file {tasty}
                    }}
                }}
            }}
        }}
    }}
}}
"#,
        base = base,
        adaway_disabled = adaway_disabled,
        tasty = tasty.display()
    )
}

async fn fixture() -> (TempDir, String, PathBuf) {
    let dir = TempDir::new().unwrap();
    let tasty = dir.path().join("blist.hosts.src");
    std::fs::write(&tasty, "tasty.example.com\n").unwrap();
    let base = serve(vec![
        ("/adaway", 200, ADAWAY),
        ("/malc0de", 200, MALC0DE),
        ("/down", 503, ""),
    ])
    .await;
    (dir, base, tasty)
}

#[tokio::test]
async fn test_hosts_prefix_and_group_ip() {
    let (dir, base, tasty) = fixture().await;
    let out = dir.path().join("out");
    let (report, executor) = run(
        settings(&out, 4),
        router_config(&base, false, &tasty),
        Mode::Apply,
    )
    .await;

    let hosts = read(out.join("hosts.url.blacklist.conf"));
    assert_eq!(
        hosts,
        "address=/ads.example.com/192.168.1.1\naddress=/track.example.org/192.168.1.1\n"
    );
    assert_eq!(
        read(out.join("hosts.file.blacklist.conf")),
        "address=/tasty.example.com/192.168.1.1\n"
    );
    assert_eq!(report.group("hosts").unwrap().kept, 3);

    // Reloaded exactly once, through the shell
    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "/bin/bash");
    assert_eq!(calls[0].1, vec!["-c", "service dnsmasq restart"]);
}

#[tokio::test]
async fn test_unavailable_source_does_not_block_siblings() {
    let (dir, base, tasty) = fixture().await;
    let out = dir.path().join("out");
    let (report, _) = run(
        settings(&out, 2),
        router_config(&base, false, &tasty),
        Mode::Apply,
    )
    .await;

    let domains = report.group("domains").unwrap();
    assert_eq!(domains.failed, vec!["broken"]);
    assert_eq!(domains.fetched, vec!["malc0de", "pre-configured"]);

    let compiled = read(out.join("domains.url.blacklist.conf"));
    assert!(compiled.contains("address=/evil.example.net/0.0.0.0\n"));
    // apple.com is excluded at the blacklist level
    assert!(!compiled.contains("apple.com"));
}

#[tokio::test]
async fn test_wildcard_include_protects_and_is_not_emitted() {
    let (dir, base, tasty) = fixture().await;
    let out = dir.path().join("out");
    let mut s = settings(&out, 2);
    s.exclude_links.clear();

    let config = router_config(&base, false, &tasty)
        .replace("include adsrvr.org", "include adsrvr.org\n                    exclude doubleclick.net");
    run(s, config, Mode::Apply).await;

    let urls = read(out.join("domains.url.blacklist.conf"));
    assert!(urls.contains("address=/ad.doubleclick.net/0.0.0.0\n"));
    let pre = read(out.join("domains.pre-configured.blacklist.conf"));
    assert_eq!(pre, "address=/adsrvr.org/0.0.0.0\n");
}

#[tokio::test]
async fn test_disabling_source_purges_only_its_file() {
    let (dir, base, tasty) = fixture().await;
    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("local.conf"), "server=/lan/192.168.1.1\n").unwrap();

    run(
        settings(&out, 2),
        router_config(&base, false, &tasty),
        Mode::Apply,
    )
    .await;
    let url_file = out.join("hosts.url.blacklist.conf");
    let file_file = out.join("hosts.file.blacklist.conf");
    assert!(url_file.exists());
    let before = read(file_file.clone());

    let (report, _) = run(
        settings(&out, 2),
        router_config(&base, true, &tasty),
        Mode::Apply,
    )
    .await;

    assert!(!url_file.exists());
    assert_eq!(report.purged, vec![url_file]);
    assert_eq!(read(file_file), before);
    assert_eq!(read(out.join("local.conf")), "server=/lan/192.168.1.1\n");
}

#[tokio::test]
async fn test_output_independent_of_worker_count() {
    let (dir, base, tasty) = fixture().await;
    let config = router_config(&base, false, &tasty);
    let one = dir.path().join("one");
    let many = dir.path().join("many");

    run(settings(&one, 1), config.clone(), Mode::Apply).await;
    run(settings(&many, 16), config, Mode::Apply).await;

    let s = settings(&one, 1);
    for group in ["blacklist", "domains", "hosts"] {
        for kind in SourceKind::ALL {
            let a = s.output_path(group, kind);
            let b = many.join(a.file_name().unwrap());
            assert_eq!(a.exists(), b.exists(), "{:?}", a);
            if a.exists() {
                assert_eq!(read(a), read(b));
            }
        }
    }
}

#[tokio::test]
async fn test_dry_run_leaves_disk_alone() {
    let (dir, base, tasty) = fixture().await;
    let out = dir.path().join("out");
    let (report, executor) = run(
        settings(&out, 2),
        router_config(&base, false, &tasty),
        Mode::DryRun,
    )
    .await;

    assert!(!out.exists());
    assert!(executor.calls().is_empty());
    assert!(report.total_kept() > 0);
}

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_edgeblock"))
}

#[test]
fn test_version_command() {
    let output = binary().arg("version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("edgeblock"));
}

#[test]
fn test_help_command() {
    let output = binary().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("update"));
    assert!(stdout.contains("watch"));
}

#[test]
fn test_show_command_prints_json() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.boot");
    std::fs::write(
        &config,
        "blacklist {\n    exclude apple.com\n    hosts {\n        include beap.gemini.yahoo.com\n    }\n}\n",
    )
    .unwrap();

    let output = binary()
        .args(["show", "-q", "--file"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let tree: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let groups = tree["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1]["name"], "hosts");
    // Excludes composed from blacklist
    assert_eq!(groups[1]["excludes"][0], "apple.com");
}

#[test]
fn test_update_rejects_malformed_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.boot");
    std::fs::write(&config, "blacklist {\n    hosts {\n").unwrap();

    let output = binary()
        .args(["update", "--dry-run", "--file"])
        .arg(&config)
        .arg("--dir")
        .arg(dir.path().join("out"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("out").exists());
}
