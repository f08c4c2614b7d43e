//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run harshcrypto inside `dir` with the given arguments
fn run_harshcrypto(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_harshcrypto"))
        .args(args)
        .current_dir(dir)
        .env_remove("HARSHCRYPTO_KEY_FILE")
        .env_remove("HARSHCRYPTO_CHUNK_SIZE")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run harshcrypto")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Temp dir with a freshly generated key.key in it
fn workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let output = run_harshcrypto(temp_dir.path(), &["generate-key"]);
    assert_success(&output, "generate-key");
    temp_dir
}

#[test]
fn test_generate_key_writes_key_store() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_harshcrypto(temp_dir.path(), &["generate-key"]);
    assert_success(&output, "generate-key");

    let key = fs::read(temp_dir.path().join("key.key")).unwrap();
    assert_eq!(key.len(), 32);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Key generated"));
}

#[test]
fn test_generate_key_underscore_alias() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_harshcrypto(temp_dir.path(), &["generate_key"]);
    assert_success(&output, "generate_key");
    assert!(temp_dir.path().join("key.key").exists());
}

#[test]
fn test_generate_key_refuses_overwrite() {
    let temp_dir = workspace();
    let key_path = temp_dir.path().join("key.key");
    let original = fs::read(&key_path).unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["generate-key"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
    assert_eq!(fs::read(&key_path).unwrap(), original);

    let output = run_harshcrypto(temp_dir.path(), &["generate-key", "--force"]);
    assert_success(&output, "generate-key --force");
    assert_ne!(fs::read(&key_path).unwrap(), original);
}

#[test]
fn test_encrypt_decrypt_file_roundtrip() {
    let temp_dir = workspace();
    let file = temp_dir.path().join("hello.txt");
    fs::write(&file, "hello, world\n").unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "hello.txt"]);
    assert_success(&output, "encrypt");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Encryption completed for file"));
    assert_ne!(fs::read(&file).unwrap(), b"hello, world\n");

    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "hello.txt"]);
    assert_success(&output, "decrypt");
    assert_eq!(fs::read_to_string(&file).unwrap(), "hello, world\n");
}

#[test]
fn test_custom_key_file_location() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = temp_dir.path().join("keys").join("my.key");
    fs::create_dir_all(key_path.parent().unwrap()).unwrap();
    let key_arg = key_path.to_str().unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["generate-key", "--key-file", key_arg]);
    assert_success(&output, "generate-key");
    assert!(!temp_dir.path().join("key.key").exists());

    fs::write(temp_dir.path().join("a.txt"), b"alpha").unwrap();
    let output = run_harshcrypto(temp_dir.path(), &["--key-file", key_arg, "encrypt", "a.txt"]);
    assert_success(&output, "encrypt");
    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "a.txt", "--key-file", key_arg]);
    assert_success(&output, "decrypt");
    assert_eq!(fs::read(temp_dir.path().join("a.txt")).unwrap(), b"alpha");
}

#[test]
fn test_chunk_size_independence() {
    let temp_dir = workspace();
    let file = temp_dir.path().join("data.pdf");
    let content: Vec<u8> = (0..5000u32).map(|i| (i % 249) as u8).collect();
    fs::write(&file, &content).unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "data.pdf", "--chunk-size", "1"]);
    assert_success(&output, "encrypt");

    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "data.pdf", "--chunk-size", "64"]);
    assert_success(&output, "decrypt");
    assert_eq!(fs::read(&file).unwrap(), content);
}

#[test]
fn test_empty_file_roundtrip() {
    let temp_dir = workspace();
    let file = temp_dir.path().join("empty.txt");
    fs::write(&file, b"").unwrap();

    assert_success(&run_harshcrypto(temp_dir.path(), &["e", "empty.txt"]), "encrypt");
    assert_success(&run_harshcrypto(temp_dir.path(), &["d", "empty.txt"]), "decrypt");
    assert_eq!(fs::read(&file).unwrap(), b"");
}

#[test]
fn test_directory_filters_extensions() {
    let temp_dir = workspace();
    let docs = temp_dir.path().join("docs");
    fs::create_dir_all(docs.join("nested")).unwrap();
    fs::write(docs.join("a.txt"), b"alpha").unwrap();
    fs::write(docs.join("b.exe"), b"bravo").unwrap();
    fs::write(docs.join("nested").join("c.pdf"), b"charlie").unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "docs"]);
    assert_success(&output, "encrypt");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Encryption completed for directory"));
    assert!(output.stderr.is_empty() || !String::from_utf8_lossy(&output.stderr).contains("b.exe"));

    assert_eq!(fs::read(docs.join("b.exe")).unwrap(), b"bravo");
    assert_ne!(fs::read(docs.join("a.txt")).unwrap(), b"alpha");
    assert_ne!(fs::read(docs.join("nested").join("c.pdf")).unwrap(), b"charlie");

    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "docs"]);
    assert_success(&output, "decrypt");
    assert_eq!(fs::read(docs.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(docs.join("nested").join("c.pdf")).unwrap(), b"charlie");
}

#[test]
fn test_custom_extension_list() {
    let temp_dir = workspace();
    let docs = temp_dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("notes.md"), b"markdown").unwrap();
    fs::write(docs.join("a.txt"), b"alpha").unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "docs", "--ext", "md"]);
    assert_success(&output, "encrypt");

    assert_ne!(fs::read(docs.join("notes.md")).unwrap(), b"markdown");
    assert_eq!(fs::read(docs.join("a.txt")).unwrap(), b"alpha");
}

#[test]
fn test_directory_continues_after_file_failure() {
    let temp_dir = workspace();
    let docs = temp_dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), b"alpha").unwrap();
    fs::write(docs.join("b.txt"), b"bravo").unwrap();
    fs::write(docs.join("c.txt"), b"charlie").unwrap();

    // Only b.txt is encrypted, so decrypting the directory fails for a and c.
    assert_success(
        &run_harshcrypto(temp_dir.path(), &["encrypt", "docs/b.txt"]),
        "encrypt",
    );
    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "docs"]);

    // Per-file failures are reported but do not fail the batch.
    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error processing"), "stderr: {}", stderr);
    assert!(stderr.contains("a.txt"), "stderr: {}", stderr);
    assert!(stderr.contains("c.txt"), "stderr: {}", stderr);
    assert!(!stderr.contains("b.txt"), "stderr: {}", stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Decryption completed for directory"),
        "stdout: {}",
        stdout
    );

    assert_eq!(fs::read(docs.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(docs.join("b.txt")).unwrap(), b"bravo");
    assert_eq!(fs::read(docs.join("c.txt")).unwrap(), b"charlie");
}

#[test]
fn test_missing_key_fails_before_touching_files() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a.txt");
    fs::write(&file, b"alpha").unwrap();

    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "a.txt"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("key file"));
    assert_eq!(fs::read(&file).unwrap(), b"alpha");
}

#[test]
fn test_missing_path_fails() {
    let temp_dir = workspace();
    let output = run_harshcrypto(temp_dir.path(), &["encrypt", "nonexistent.txt"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("path not found"));
    assert!(!temp_dir.path().join("nonexistent.txt").exists());
}

#[test]
fn test_missing_path_argument_fails() {
    let temp_dir = workspace();
    let output = run_harshcrypto(temp_dir.path(), &["encrypt"]);
    assert!(!output.status.success());
}

#[test]
fn test_wrong_key_leaves_file_intact() {
    let temp_dir = workspace();
    let file = temp_dir.path().join("secret.txt");
    fs::write(&file, b"secret").unwrap();
    assert_success(&run_harshcrypto(temp_dir.path(), &["encrypt", "secret.txt"]), "encrypt");
    let encrypted = fs::read(&file).unwrap();

    assert_success(
        &run_harshcrypto(temp_dir.path(), &["generate-key", "--force"]),
        "generate-key --force",
    );
    let output = run_harshcrypto(temp_dir.path(), &["decrypt", "secret.txt"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("wrong key"));
    assert_eq!(fs::read(&file).unwrap(), encrypted);
}

#[test]
fn test_large_file_roundtrip() {
    let temp_dir = workspace();
    let file = temp_dir.path().join("large.jpg");
    let large_content = vec![0x42u8; 1024 * 1024 + 17];
    fs::write(&file, &large_content).unwrap();

    assert_success(&run_harshcrypto(temp_dir.path(), &["encrypt", "large.jpg"]), "encrypt");
    assert_success(&run_harshcrypto(temp_dir.path(), &["decrypt", "large.jpg"]), "decrypt");
    assert_eq!(fs::read(&file).unwrap(), large_content);
}
