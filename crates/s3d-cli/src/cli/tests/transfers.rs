//! Tests for upload, download, process, checksum, completions and man.

use super::{parse, try_parse};
use crate::cli::{CliCommand, DEFAULT_KEY};
use std::path::Path;

#[test]
fn cli_parse_upload() {
    match parse(&["s3d", "upload", "ratings.csv"]) {
        CliCommand::Upload {
            file,
            key,
            multipart,
        } => {
            assert_eq!(file, Path::new("ratings.csv"));
            assert!(key.is_none());
            assert!(!multipart);
        }
        _ => panic!("expected Upload"),
    }
}

#[test]
fn cli_parse_upload_multipart_with_key() {
    match parse(&[
        "s3d",
        "upload",
        "ratings.csv",
        "--key",
        "multipart-ratings.csv",
        "--multipart",
    ]) {
        CliCommand::Upload { key, multipart, .. } => {
            assert_eq!(key.as_deref(), Some("multipart-ratings.csv"));
            assert!(multipart);
        }
        _ => panic!("expected Upload"),
    }
}

#[test]
fn cli_parse_download() {
    match parse(&["s3d", "download", "/tmp/out.csv"]) {
        CliCommand::Download { key, dest } => {
            assert_eq!(key, DEFAULT_KEY);
            assert_eq!(dest, Path::new("/tmp/out.csv"));
        }
        _ => panic!("expected Download"),
    }
}

#[test]
fn cli_parse_download_requires_dest() {
    assert!(try_parse(&["s3d", "download"]).is_err());
}

#[test]
fn cli_parse_process() {
    match parse(&["s3d", "process", "--key", "ratings.csv"]) {
        CliCommand::Process { key } => assert_eq!(key, "ratings.csv"),
        _ => panic!("expected Process"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["s3d", "checksum", "/tmp/file.iso"]) {
        CliCommand::Checksum { path } => assert_eq!(path, Path::new("/tmp/file.iso")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["s3d", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_man() {
    assert!(matches!(parse(&["s3d", "man"]), CliCommand::Man));
}
