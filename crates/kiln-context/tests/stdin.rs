use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use kiln_context::{BuildSources, ContextSource, Error, RecipeSource};

fn gzip_context(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn archive_on_stdin_becomes_context() {
    let data = gzip_context(&[
        ("Dockerfile", b"FROM alpine\nCOPY app.sh /\n"),
        ("app.sh", b"#!/bin/sh\necho hi\n"),
    ]);

    let sources =
        BuildSources::prepare(RecipeSource::Default, ContextSource::Stdin, data.as_slice()).unwrap();

    assert!(sources.is_materialized());
    assert_eq!(sources.recipe_path(), None);
    assert_eq!(
        std::fs::read(sources.context_dir().join("app.sh")).unwrap(),
        b"#!/bin/sh\necho hi\n"
    );
}

#[test]
fn archive_on_stdin_keeps_explicit_recipe_path() {
    let data = gzip_context(&[("Dockerfile", b"FROM alpine\n")]);
    let recipe = RecipeSource::Path(PathBuf::from("/work/Dockerfile.ci"));

    let sources = BuildSources::prepare(recipe, ContextSource::Stdin, data.as_slice()).unwrap();
    assert_eq!(sources.recipe_path(), Some(Path::new("/work/Dockerfile.ci")));
}

#[test]
fn plain_recipe_on_stdin_is_written_into_context() {
    let sources = BuildSources::prepare(
        RecipeSource::Default,
        ContextSource::Stdin,
        &b"FROM busybox\nCMD [\"true\"]\n"[..],
    )
    .unwrap();

    let recipe = sources.recipe_path().unwrap();
    assert!(recipe.starts_with(sources.context_dir()));
    assert_eq!(std::fs::read(recipe).unwrap(), b"FROM busybox\nCMD [\"true\"]\n");
}

#[test]
fn recipe_on_stdin_with_local_context() {
    let context = tempfile::tempdir().unwrap();
    let sources = BuildSources::prepare(
        RecipeSource::Stdin,
        ContextSource::Directory(context.path().to_path_buf()),
        &b"FROM alpine\n"[..],
    )
    .unwrap();

    assert_eq!(sources.context_dir(), context.path());
    let recipe = sources.recipe_path().unwrap().to_path_buf();
    assert_eq!(std::fs::read(&recipe).unwrap(), b"FROM alpine\n");

    sources.close().unwrap();
    assert!(!recipe.exists());
}

#[test]
fn temporary_context_is_removed_on_drop() {
    let data = gzip_context(&[("Dockerfile", b"FROM alpine\n")]);
    let sources =
        BuildSources::prepare(RecipeSource::Default, ContextSource::Stdin, data.as_slice()).unwrap();
    let dir = sources.context_dir().to_path_buf();
    assert!(dir.join("Dockerfile").exists());

    drop(sources);
    assert!(!dir.exists());
}

#[test]
fn malicious_archive_on_stdin_fails_closed() {
    let mut raw = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    let name = b"../../kiln-escape";
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(1);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    raw.append(&header, &b"x"[..]).unwrap();
    let plain = raw.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&plain).unwrap();
    let data = encoder.finish().unwrap();

    let result = BuildSources::prepare(RecipeSource::Default, ContextSource::Stdin, data.as_slice());
    match result {
        Err(Error::Archive(err)) => assert!(err.is_security()),
        other => panic!("expected security error, got {other:?}"),
    }
}
