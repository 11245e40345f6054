// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Tracked-frame archive unpacking.
//!
//! Once the tracking service reports a movie as tracked, it publishes a
//! zip archive holding one image per frame. The archive is unpacked into
//! a per-movie temp directory; the sorted entry names define the frame
//! order. Frames are decoded lazily from disk, not up front.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

use crate::io::media;

/// Directory a movie's frames are unpacked into.
pub fn unpack_dir(movie_id: i64) -> PathBuf {
    std::env::temp_dir().join(format!("tracs-movie-{movie_id}"))
}

/// Unpack a frame archive and return the frame image paths in order.
///
/// Any previous unpack of the same movie is replaced; stale frames from
/// an earlier tracking run must not leak into the new sequence.
pub fn unpack_frames(bytes: &[u8], movie_id: i64) -> Result<Vec<PathBuf>> {
    let dir = unpack_dir(movie_id);
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to clear {}", dir.display()))?;
    }
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("failed to read frame archive")?;

    let mut names: Vec<String> = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read archive entry {index}"))?;
        if entry.is_dir() {
            continue;
        }
        if media::is_image_path(Path::new(entry.name())) {
            names.push(entry.name().to_string());
        }
    }
    if names.is_empty() {
        bail!("frame archive contains no images");
    }
    // Entry-name order defines frame order.
    names.sort();

    let mut paths = Vec::with_capacity(names.len());
    for name in &names {
        let mut entry = archive
            .by_name(name)
            .with_context(|| format!("failed to reopen archive entry {name}"))?;
        let file_name = Path::new(name)
            .file_name()
            .with_context(|| format!("archive entry {name} has no file name"))?;
        let out_path = dir.join(file_name);
        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        paths.push(out_path);
    }

    info!("unpacked {} frames into {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_unpack_orders_and_filters_entries() {
        let bytes = build_archive(&[
            ("frame_0002.jpg", b"b"),
            ("notes.txt", b"skip me"),
            ("frame_0001.jpg", b"a"),
        ]);
        let paths = unpack_frames(&bytes, -101).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("frame_0001.jpg"));
        assert!(paths[1].ends_with("frame_0002.jpg"));
        assert_eq!(fs::read(&paths[0]).unwrap(), b"a");

        fs::remove_dir_all(unpack_dir(-101)).ok();
    }

    #[test]
    fn test_unpack_replaces_previous_run() {
        let first = build_archive(&[("frame_0001.jpg", b"old"), ("frame_0002.jpg", b"old")]);
        unpack_frames(&first, -102).unwrap();

        let second = build_archive(&[("frame_0001.jpg", b"new")]);
        let paths = unpack_frames(&second, -102).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(fs::read(&paths[0]).unwrap(), b"new");
        assert!(!unpack_dir(-102).join("frame_0002.jpg").exists());

        fs::remove_dir_all(unpack_dir(-102)).ok();
    }

    #[test]
    fn test_unpack_rejects_empty_archive() {
        let bytes = build_archive(&[("readme.md", b"nothing here")]);
        assert!(unpack_frames(&bytes, -103).is_err());
        fs::remove_dir_all(unpack_dir(-103)).ok();
    }
}
