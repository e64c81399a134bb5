use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const PASSWORD: &str = "correct horse battery staple";

/// Port 9 (discard) is closed on loopback, so every remote call fails fast.
const DEAD_ENDPOINT: &str = "127.0.0.1:9";

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_exam"))
}

/// One isolated profile: its own config, data and runtime directories.
struct Profile {
    dir: TempDir,
}

impl Profile {
    fn new() -> Self {
        // Short prefix keeps socket paths under the Unix length limit.
        let dir = tempfile::Builder::new()
            .prefix("ex")
            .tempdir()
            .expect("temp dir");
        for sub in ["c", "d", "r"] {
            std::fs::create_dir_all(dir.path().join(sub)).expect("create dir");
        }
        let profile = Self { dir };
        let out = profile.run(&["init", "--session-ttl-seconds", "0"]);
        assert_success(&out);
        profile
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(bin());
        cmd.args(args)
            .env("XDG_CONFIG_HOME", self.path("c"))
            .env("XDG_DATA_HOME", self.path("d"))
            .env("XDG_RUNTIME_DIR", self.path("r"))
            .env("TMPDIR", self.path("r"))
            .env("NO_COLOR", "1")
            .env_remove("EXAM_CONFIG")
            .env_remove("EXAM_DB")
            .env_remove("EXAM_LOG")
            .env_remove("EXAM_TOKEN")
            .env_remove("EXAM_UNLOCK_PASSWORD")
            .env_remove("EXAM_BACKUP_PASSWORD");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run exam")
    }

    fn run_with(&self, args: &[&str], envs: &[(&str, &str)]) -> Output {
        let mut cmd = self.command(args);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        cmd.output().expect("run exam")
    }

    fn json(&self, args: &[&str]) -> Value {
        let out = self.run(args);
        assert_success(&out);
        serde_json::from_slice(&out.stdout).expect("stdout is JSON")
    }

    fn configure(&self) -> Output {
        self.run_with(
            &["remote", "configure", DEAD_ENDPOINT, "--no-input"],
            &[("EXAM_TOKEN", "tok-123"), ("EXAM_UNLOCK_PASSWORD", PASSWORD)],
        )
    }
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "exit {:?}\nstdout: {}\nstderr: {}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

fn new_paper(profile: &Profile, title: &str) -> String {
    let paper = profile.json(&["paper", "new", title, "--json"]);
    paper["id"].as_str().expect("paper id").to_string()
}

#[test]
fn test_init_writes_config_and_refuses_overwrite() {
    let profile = Profile::new();
    let config = std::fs::read_to_string(profile.path("c").join("exam").join("config.toml"))
        .expect("config written");
    assert!(config.contains("ttl_seconds = 0"));

    let out = profile.run(&["init"]);
    assert_eq!(out.status.code(), Some(4));

    let out = profile.run(&["init", "--force", "--session-ttl-seconds", "0"]);
    assert_success(&out);
}

#[test]
fn test_answer_key_and_score() {
    let profile = Profile::new();
    let id = new_paper(&profile, "Capitals");
    let prefix = &id[..8];

    assert_success(&profile.run(&["answer", prefix, "1", "Paris"]));
    assert_success(&profile.run(&["answer", prefix, "2", "Rome"]));
    assert_success(&profile.run(&["key", prefix, "1", "Paris"]));
    assert_success(&profile.run(&["key", prefix, "2", "Madrid"]));
    assert_success(&profile.run(&["memo", prefix, "2", "mixed up"]));
    assert_success(&profile.run(&["choose", prefix, "1", "b"]));
    assert_success(&profile.run(&["star", prefix, "2"]));

    let score = profile.json(&["score", prefix, "--json"]);
    assert_eq!(score["total"], 2);
    assert_eq!(score["answered"], 2);
    assert_eq!(score["keyed"], 2);
    assert_eq!(score["correct"], 1);
    assert_eq!(score["incorrect"], 1);

    let paper = profile.json(&["paper", "show", &id, "--json"]);
    let questions = paper["questions"].as_array().expect("questions");
    // Answering the last question appends a blank one.
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[1]["memo"], "mixed up");
    assert_eq!(questions[1]["starred"], true);
    assert_eq!(questions[0]["selectedOption"], "B");
}

#[test]
fn test_score_review_filters_by_state() {
    let profile = Profile::new();
    let id = new_paper(&profile, "Capitals");
    let prefix = &id[..8];
    assert_success(&profile.run(&["answer", prefix, "1", "Paris"]));
    assert_success(&profile.run(&["answer", prefix, "2", "Rome"]));
    assert_success(&profile.run(&["key", prefix, "1", "Paris"]));
    assert_success(&profile.run(&["key", prefix, "2", "Madrid"]));
    assert_success(&profile.run(&["choose", prefix, "1", "b"]));
    assert_success(&profile.run(&["star", prefix, "2"]));

    let plain = profile.json(&["score", prefix, "--json"]);
    assert!(plain.get("questions").is_none());

    let wrong = profile.json(&["score", prefix, "--wrong", "--json"]);
    let listed = wrong["questions"].as_array().expect("questions");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["number"], 2);
    assert_eq!(listed[0]["state"], "NX");
    assert_eq!(listed[0]["starred"], true);
    assert_eq!(listed[0]["correctAnswer"], "Madrid");

    let tagged = profile.json(&["score", prefix, "--option", "B", "--json"]);
    let listed = tagged["questions"].as_array().expect("questions");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["state"], "BO");

    let none = profile.json(&["score", prefix, "--starred", "--correct", "--json"]);
    assert!(none["questions"].as_array().expect("questions").is_empty());

    let all = profile.json(&["score", prefix, "--list", "--json"]);
    assert_eq!(all["questions"].as_array().expect("questions").len(), 2);

    let out = profile.run(&["score", prefix, "--option", "z"]);
    assert_eq!(out.status.code(), Some(4), "{}", stderr(&out));
}

#[test]
fn test_bad_option_and_question_zero_are_invalid_input() {
    let profile = Profile::new();
    let id = new_paper(&profile, "Options");

    let out = profile.run(&["choose", &id, "1", "z"]);
    assert_eq!(out.status.code(), Some(4), "{}", stderr(&out));

    let out = profile.run(&["answer", &id, "0", "x"]);
    assert_eq!(out.status.code(), Some(4), "{}", stderr(&out));
}

#[test]
fn test_missing_paper_is_not_found() {
    let profile = Profile::new();
    let out = profile.run(&["paper", "show", "nope"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("exam paper list"));
}

#[test]
fn test_delete_needs_confirmation_without_terminal() {
    let profile = Profile::new();
    let id = new_paper(&profile, "Disposable");

    let out = profile.run(&["paper", "delete", &id]);
    assert_eq!(out.status.code(), Some(4));

    assert_success(&profile.run(&["paper", "delete", &id, "--yes"]));
    let list = profile.json(&["paper", "list", "--json"]);
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_copy_export_and_import() {
    let profile = Profile::new();
    let id = new_paper(&profile, "History");
    assert_success(&profile.run(&["answer", &id, "1", "1066"]));
    assert_success(&profile.run(&["paper", "copy", &id]));

    let export = profile.path("export.json");
    let export_arg = export.to_string_lossy().to_string();
    assert_success(&profile.run(&["paper", "export", "-o", &export_arg]));

    let other = Profile::new();
    assert_success(&other.run(&["paper", "import", &export_arg]));
    let list = other.json(&["paper", "list", "--json"]);
    let papers = list.as_array().expect("array");
    assert_eq!(papers.len(), 2);
    for paper in papers {
        assert_eq!(paper["title"], "History");
        assert_ne!(paper["id"], id.as_str());
        assert_eq!(paper["questions"][0]["userAnswer"], "1066");
    }
}

#[test]
fn test_take_requires_terminal() {
    let profile = Profile::new();
    let id = new_paper(&profile, "Quiz");
    let out = profile.run(&["take", &id]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn test_remote_commands_need_configuration() {
    let profile = Profile::new();

    let status = profile.json(&["remote", "status", "--json"]);
    assert_eq!(status["state"], "unset");
    assert_eq!(status["endpoint"], Value::Null);
    assert_eq!(status["activeFolder"], "exam-papers");

    let out = profile.run(&["ns", "list"]);
    assert_eq!(out.status.code(), Some(5));
    assert!(stderr(&out).contains("exam remote configure"));

    let out = profile.run(&["sync", "push"]);
    assert_eq!(out.status.code(), Some(5));
}

#[test]
fn test_configure_without_token_is_invalid_input() {
    let profile = Profile::new();
    let out = profile.run(&["remote", "configure", DEAD_ENDPOINT, "--no-input"]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn test_configure_saves_sealed_token_despite_unreachable_remote() {
    let profile = Profile::new();

    let out = profile.configure();
    assert_success(&out);
    assert!(stderr(&out).contains("Could not reach the remote"));

    // The session cache is off, so a new process starts locked.
    let status = profile.json(&["remote", "status", "--json"]);
    assert_eq!(status["state"], "locked");
    assert_eq!(status["endpoint"], "https://127.0.0.1:9");

    let settings =
        std::fs::read_to_string(profile.path("d").join("exam").join("settings.json"))
            .expect("settings written");
    assert!(!settings.contains("tok-123"));
}

#[test]
fn test_unlock_with_wrong_and_right_password() {
    let profile = Profile::new();
    assert_success(&profile.configure());

    let out = profile.run(&["remote", "unlock", "--no-input"]);
    assert_eq!(out.status.code(), Some(5));

    let out = profile.run_with(
        &["remote", "unlock", "--no-input"],
        &[("EXAM_UNLOCK_PASSWORD", "wrong password")],
    );
    assert_eq!(out.status.code(), Some(5));
    assert!(stderr(&out).contains("Incorrect password"));

    // Right password: unlocked, and the failed pull is only a warning.
    let out = profile.run_with(
        &["remote", "unlock", "--no-input"],
        &[("EXAM_UNLOCK_PASSWORD", PASSWORD)],
    );
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Unlocked"));
}

#[test]
fn test_unreachable_remote_fails_explicit_push() {
    let profile = Profile::new();
    assert_success(&profile.configure());

    let out = profile.run_with(&["sync", "push"], &[("EXAM_UNLOCK_PASSWORD", PASSWORD)]);
    assert_eq!(out.status.code(), Some(6), "{}", stderr(&out));
}

#[test]
fn test_local_edit_survives_unreachable_remote() {
    let profile = Profile::new();
    assert_success(&profile.configure());

    // Locked: the paper is saved locally and the push only warns.
    let out = profile.run(&["paper", "new", "Offline", "--json"]);
    assert_success(&out);
    assert!(stderr(&out).contains("Saving to remote failed"));

    let list = profile.json(&["paper", "list", "--json"]);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_backup_round_trip_into_new_profile() {
    let profile = Profile::new();
    assert_success(&profile.configure());

    let backup = profile.path("backup.txt");
    let backup_arg = backup.to_string_lossy().to_string();
    let out = profile.run_with(
        &["remote", "backup-export", "-o", &backup_arg],
        &[
            ("EXAM_UNLOCK_PASSWORD", PASSWORD),
            ("EXAM_BACKUP_PASSWORD", "backup pw"),
        ],
    );
    assert_success(&out);
    let envelope = std::fs::read_to_string(&backup).expect("backup written");
    assert_eq!(envelope.trim().split('.').count(), 3);

    let other = Profile::new();
    let out = other.run_with(
        &["remote", "backup-import", &backup_arg],
        &[
            ("EXAM_BACKUP_PASSWORD", "wrong"),
            ("EXAM_UNLOCK_PASSWORD", "new machine pw"),
        ],
    );
    assert_eq!(out.status.code(), Some(5));

    let out = other.run_with(
        &["remote", "backup-import", &backup_arg],
        &[
            ("EXAM_BACKUP_PASSWORD", "backup pw"),
            ("EXAM_UNLOCK_PASSWORD", "new machine pw"),
        ],
    );
    assert_success(&out);
    let status = other.json(&["remote", "status", "--json"]);
    assert_eq!(status["endpoint"], "https://127.0.0.1:9");
    assert_eq!(status["state"], "locked");
}

#[test]
fn test_generate_token_prints_a_token() {
    let profile = Profile::new();
    let out = profile.run(&["remote", "generate-token"]);
    assert_success(&out);
    let token = String::from_utf8_lossy(&out.stdout).trim().to_string();
    assert!(token.len() >= 32, "{}", token);
}

#[test]
fn test_completions() {
    let profile = Profile::new();
    let out = profile.run(&["completions", "bash"]);
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("exam"));
}
