//! Tests for stream, count-file and select.

use super::{parse, try_parse};
use crate::cli::{CliCommand, DEFAULT_KEY};
use s3d_core::store::FileHeaderInfo;
use std::path::Path;

#[test]
fn cli_parse_stream_defaults() {
    match parse(&["s3d", "stream"]) {
        CliCommand::Stream { key, parallel } => {
            assert_eq!(key, DEFAULT_KEY);
            assert!(!parallel);
        }
        _ => panic!("expected Stream"),
    }
}

#[test]
fn cli_parse_stream_parallel_key() {
    match parse(&["s3d", "stream", "--key", "ratings.csv", "--parallel"]) {
        CliCommand::Stream { key, parallel } => {
            assert_eq!(key, "ratings.csv");
            assert!(parallel);
        }
        _ => panic!("expected Stream"),
    }
}

#[test]
fn cli_parse_count_file() {
    match parse(&["s3d", "count-file", "/tmp/ratings.csv", "--parallel"]) {
        CliCommand::CountFile { path, parallel } => {
            assert_eq!(path, Path::new("/tmp/ratings.csv"));
            assert!(parallel);
        }
        _ => panic!("expected CountFile"),
    }
}

#[test]
fn cli_parse_select_defaults() {
    match parse(&["s3d", "select"]) {
        CliCommand::Select(args) => {
            assert_eq!(args.key, DEFAULT_KEY);
            assert!(!args.sequential);
            assert!(!args.json);
            assert!(args.chunk_bytes.is_none());
            assert!(args.query.is_none());
            assert!(args.header.is_none());
        }
        _ => panic!("expected Select"),
    }
}

#[test]
fn cli_parse_select_overrides() {
    match parse(&[
        "s3d",
        "select",
        "--sequential",
        "--json",
        "--chunk-bytes",
        "1048576",
        "--query",
        "select s.userId from S3Object s",
        "--header",
        "use",
    ]) {
        CliCommand::Select(args) => {
            assert!(args.sequential);
            assert!(args.json);
            assert_eq!(args.chunk_bytes, Some(1_048_576));
            assert_eq!(args.query.as_deref(), Some("select s.userId from S3Object s"));
            assert_eq!(args.header, Some(FileHeaderInfo::Use));
        }
        _ => panic!("expected Select"),
    }
}

#[test]
fn cli_parse_select_rejects_unknown_header_mode() {
    assert!(try_parse(&["s3d", "select", "--header", "skip"]).is_err());
}
