//! Throwaway bare repositories for tests.

use git2::{Oid, Repository, Signature};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

/// Summary of a branch tip.
#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub id: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
}

/// Create `remote.git` under `dir` with one commit on `main` holding
/// `README.md` and `apps/.keep`.
pub fn seed_remote(dir: &Path) -> PathBuf {
    let path = dir.join("remote.git");
    let repo = Repository::init_bare(&path).expect("init bare remote");
    let sig = Signature::now("seed", "seed@example.com").expect("signature");

    let keep = repo.blob(b"").expect("blob");
    let mut apps = repo.treebuilder(None).expect("treebuilder");
    apps.insert(".keep", keep, 0o100644).expect("insert .keep");
    let apps_id = apps.write().expect("write apps tree");

    let readme = repo.blob(b"# cluster state\n").expect("blob");
    let mut root = repo.treebuilder(None).expect("treebuilder");
    root.insert("README.md", readme, 0o100644).expect("insert README");
    root.insert("apps", apps_id, 0o040000).expect("insert apps");
    let tree_id = root.write().expect("write root tree");
    let tree = repo.find_tree(tree_id).expect("find tree");

    repo.commit(Some("refs/heads/main"), &sig, &sig, "seed", &tree, &[])
        .expect("seed commit");
    repo.set_head("refs/heads/main").expect("set HEAD");
    path
}

fn branch_tip(repo: &Repository, branch: &str) -> Oid {
    repo.refname_to_id(&format!("refs/heads/{}", branch))
        .expect("branch exists")
}

/// Content of `path` at the tip of `branch`, if present.
pub fn read_remote_file(remote: &Path, branch: &str, path: &str) -> Option<String> {
    let repo = Repository::open_bare(remote).expect("open remote");
    let commit = repo.find_commit(branch_tip(&repo, branch)).expect("tip commit");
    let tree = commit.tree().expect("tip tree");
    let entry = tree.get_path(Path::new(path)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    Some(String::from_utf8_lossy(blob.content()).into_owned())
}

pub fn remote_head_commit(remote: &Path, branch: &str) -> CommitSummary {
    let repo = Repository::open_bare(remote).expect("open remote");
    let commit = repo.find_commit(branch_tip(&repo, branch)).expect("tip commit");
    let author = commit.author();
    CommitSummary {
        id: commit.id().to_string(),
        message: commit.message().unwrap_or_default().to_string(),
        author_name: author.name().unwrap_or_default().to_string(),
        author_email: author.email().unwrap_or_default().to_string(),
    }
}

/// Serve `401 Unauthorized` with a Basic challenge to every request on a
/// local port and return an `http://` remote URL pointing at it.
///
/// The listener thread lives until the test process exits.
pub fn spawn_denying_http_remote() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  WWW-Authenticate: Basic realm=\"kgio\"\r\n\
                  Content-Length: 0\r\n\
                  Connection: close\r\n\r\n",
            );
        }
    });
    format!("http://127.0.0.1:{}/remote.git", port)
}
