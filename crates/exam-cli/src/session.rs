//! Session store backed by a per-user cache daemon.
//!
//! The unlocked token must outlive a single `exam` invocation without ever
//! touching disk. A hidden `exam internal-cache-daemon` process holds it in
//! memory behind a 0600 Unix socket, forgets it after the TTL and exits once
//! empty and idle. Every request is one line; every reply is one line.
//!
//! ```text
//! PING                 -> PONG
//! GET <key>            -> VALUE <base64> | NOT_FOUND
//! STORE <key> <base64> -> OK
//! FORGET <key>         -> OK
//! CLEAR                -> OK
//! ```

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use exam_core::kv::{MemoryKv, VolatileKv};
use exam_core::{ExamError, Result};

/// Daemon exits after this long with nothing cached.
const IDLE_EXIT: Duration = Duration::from_secs(60);

/// Where the daemon lives and how long it keeps values.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub socket_path: PathBuf,
    /// Prefix that keeps profiles (settings files) apart.
    pub profile: String,
}

struct CacheEntry {
    value: Zeroizing<Vec<u8>>,
    stored_at: Instant,
}

/// [`VolatileKv`] over the cache daemon.
pub struct SessionCache {
    config: CacheConfig,
}

impl SessionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.config.profile, key)
    }
}

impl VolatileKv for SessionCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(response) = request(&self.config.socket_path, &format!("GET {}", self.key(key)))?
        else {
            return Ok(None);
        };
        let Some(encoded) = response.strip_prefix("VALUE ") else {
            return Ok(None);
        };
        let decoded = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| ExamError::Storage(format!("Session cache decode failed: {}", e)))?;
        let value = String::from_utf8(decoded)
            .map_err(|_| ExamError::Storage("Session cache entry is not valid UTF-8".to_string()))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        ensure_daemon_running(&self.config)?;
        let encoded = Zeroizing::new(STANDARD.encode(value.as_bytes()));
        let line = Zeroizing::new(format!("STORE {} {}", self.key(key), encoded.as_str()));
        match request(&self.config.socket_path, &line)? {
            Some(response) if response == "OK" => Ok(()),
            _ => Err(ExamError::Storage(
                "Session cache refused the value".to_string(),
            )),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        request(&self.config.socket_path, &format!("FORGET {}", self.key(key)))?;
        Ok(())
    }
}

/// Session store for the profile whose settings live at `settings_path`.
///
/// A TTL of zero disables the daemon; the token then lasts for one process.
pub fn open_session_store(settings_path: &Path, ttl_seconds: u64) -> Arc<dyn VolatileKv> {
    if ttl_seconds == 0 {
        return Arc::new(MemoryKv::new());
    }
    match cache_socket_path() {
        Ok(socket_path) => Arc::new(SessionCache::new(CacheConfig {
            ttl: Duration::from_secs(ttl_seconds),
            socket_path,
            profile: profile_hash(settings_path),
        })),
        Err(e) => {
            warn!(error = %e, "Session cache unavailable; token will not outlive this command");
            Arc::new(MemoryKv::new())
        }
    }
}

pub fn run_cache_daemon(ttl: Duration, socket_path: &Path) -> anyhow::Result<()> {
    let parent = socket_path.parent().ok_or_else(|| {
        anyhow::anyhow!(
            "Cache socket path has no parent directory: {}",
            socket_path.display()
        )
    })?;
    std::fs::create_dir_all(parent).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create cache socket directory {}: {}",
            parent.display(),
            e
        )
    })?;
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }

    let listener = UnixListener::bind(socket_path)
        .map_err(|e| anyhow::anyhow!("Cache bind failed: {}", e))?;
    set_socket_permissions(socket_path)?;
    listener.set_nonblocking(true)?;
    debug!(socket = %socket_path.display(), ttl_secs = ttl.as_secs(), "Session cache listening");

    let mut cache: HashMap<String, CacheEntry> = HashMap::new();
    let mut last_activity = Instant::now();

    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                last_activity = Instant::now();
                if let Err(e) = serve(stream, &mut cache, ttl) {
                    debug!(error = %e, "Session cache client dropped");
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(anyhow::anyhow!("Cache accept failed: {}", err)),
        }

        expire_entries(&mut cache, ttl);
        if cache.is_empty() && last_activity.elapsed() >= IDLE_EXIT {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

fn serve(
    stream: UnixStream,
    cache: &mut HashMap<String, CacheEntry>,
    ttl: Duration,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut line = Zeroizing::new(String::new());
    BufReader::new(&stream).read_line(&mut line)?;
    let response = handle_request(line.trim(), cache, ttl);
    (&stream).write_all(response.as_bytes())
}

pub fn cache_socket_path() -> Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let base = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
        Ok(PathBuf::from(base).join("exam-session.sock"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        if let Ok(value) = std::env::var("XDG_RUNTIME_DIR") {
            if !value.trim().is_empty() {
                return Ok(PathBuf::from(value).join("exam").join("session.sock"));
            }
        }
        let uid = unsafe { libc::geteuid() };
        Ok(PathBuf::from(format!("/tmp/exam-{}", uid)).join("session.sock"))
    }
}

fn handle_request(request: &str, cache: &mut HashMap<String, CacheEntry>, ttl: Duration) -> String {
    let mut parts = request.splitn(3, ' ');
    let command = parts.next().unwrap_or("");
    match command {
        "PING" => "PONG\n".to_string(),
        "CLEAR" => {
            cache.clear();
            "OK\n".to_string()
        }
        "GET" => {
            let key = parts.next().unwrap_or("");
            if let Some(entry) = cache.get(key) {
                if entry.stored_at.elapsed() <= ttl {
                    let encoded = STANDARD.encode(entry.value.as_slice());
                    return format!("VALUE {}\n", encoded);
                }
            }
            "NOT_FOUND\n".to_string()
        }
        "STORE" => {
            let key = parts.next().unwrap_or("");
            let encoded = parts.next().unwrap_or("");
            match STANDARD.decode(encoded.as_bytes()) {
                Ok(decoded) if !key.is_empty() => {
                    cache.insert(
                        key.to_string(),
                        CacheEntry {
                            value: Zeroizing::new(decoded),
                            stored_at: Instant::now(),
                        },
                    );
                    "OK\n".to_string()
                }
                _ => "ERROR\n".to_string(),
            }
        }
        "FORGET" => {
            let key = parts.next().unwrap_or("");
            cache.remove(key);
            "OK\n".to_string()
        }
        _ => "ERROR\n".to_string(),
    }
}

fn expire_entries(cache: &mut HashMap<String, CacheEntry>, ttl: Duration) {
    cache.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
}

/// Send one request line. `None` when no daemon is listening.
fn request(socket_path: &Path, line: &str) -> Result<Option<String>> {
    let mut stream = match UnixStream::connect(socket_path) {
        Ok(stream) => stream,
        Err(err)
            if matches!(
                err.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
            ) =>
        {
            return Ok(None)
        }
        Err(err) => {
            return Err(ExamError::Storage(format!(
                "Session cache connect failed: {}",
                err
            )))
        }
    };
    stream
        .write_all(format!("{}\n", line).as_bytes())
        .and_then(|_| stream.shutdown(Shutdown::Write))
        .map_err(|e| ExamError::Storage(format!("Session cache write failed: {}", e)))?;
    let mut response = Zeroizing::new(String::new());
    stream
        .read_to_string(&mut response)
        .map_err(|e| ExamError::Storage(format!("Session cache read failed: {}", e)))?;
    Ok(Some(response.trim().to_string()))
}

fn cache_ping(socket_path: &Path) -> Result<bool> {
    Ok(request(socket_path, "PING")?.as_deref() == Some("PONG"))
}

fn ensure_daemon_running(config: &CacheConfig) -> Result<()> {
    if cache_ping(&config.socket_path)? {
        return Ok(());
    }

    let exe = std::env::current_exe()?;
    std::process::Command::new(exe)
        .arg("internal-cache-daemon")
        .arg("--ttl")
        .arg(config.ttl.as_secs().to_string())
        .arg("--socket")
        .arg(&config.socket_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ExamError::Storage(format!("Failed to spawn session cache: {}", e)))?;

    for _ in 0..20 {
        if cache_ping(&config.socket_path)? {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    Err(ExamError::Storage(
        "Session cache did not become ready in time".to_string(),
    ))
}

/// Short stable id for a settings file.
pub fn profile_hash(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes());
    hash.to_hex()[..16].to_string()
}

fn set_socket_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}
