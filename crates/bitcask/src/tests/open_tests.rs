use super::helpers::count_snapshot_files;
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Creation ---------------------

#[test]
fn read_write_open_creates_directory() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let store = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    assert!(path.is_dir());
    store.close()?;
    Ok(())
}

#[test]
fn read_only_open_of_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let err = Bitcask::open(dir.path().join("nope"), &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "read only cannot create new bitcask directory"
    );
}

#[test]
fn open_path_that_is_a_file_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("file");
    fs::write(&path, b"not a directory")?;

    let err = Bitcask::open(&path, &[ConfigOpt::ReadWrite]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("{}: cannot open this directory", path.display())
    );
    Ok(())
}

#[test]
fn read_only_open_of_empty_existing_directory() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");
    fs::create_dir(&path)?;

    let store = Bitcask::open(&path, &[])?;
    assert!(store.is_empty());
    assert!(store.list_keys().is_empty());
    store.close()?;
    Ok(())
}

// --------------------- Defaults and option pairs ---------------------

#[test]
fn default_open_is_read_only() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k", b"v")?;
    writer.close()?;

    let mut store = Bitcask::open(&path, &[])?;
    assert_eq!(store.get(b"k")?, b"v");
    let err = store.put(b"k", b"v2").unwrap_err();
    assert_eq!(err.to_string(), "write permission denied");
    store.close()?;
    Ok(())
}

#[test]
fn later_option_wins_within_a_pair() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let store = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    store.close()?;

    let mut store = Bitcask::open(&path, &[ConfigOpt::ReadWrite, ConfigOpt::ReadOnly])?;
    assert!(matches!(
        store.put(b"k", b"v"),
        Err(BitcaskError::WriteDenied)
    ));
    store.close()?;
    Ok(())
}

#[test]
fn sync_on_put_open_accepts_writes() -> Result<()> {
    let dir = tempdir()?;
    let mut store = Bitcask::open(
        dir.path().join("db"),
        &[ConfigOpt::ReadWrite, ConfigOpt::SyncOnPut],
    )?;
    store.put(b"k", b"v")?;
    assert_eq!(store.get(b"k")?, b"v");
    store.close()?;
    Ok(())
}

// --------------------- Writer exclusion ---------------------

#[test]
fn second_writer_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let _writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    let err = Bitcask::open(&path, &[ConfigOpt::ReadWrite]).unwrap_err();
    assert_eq!(err.to_string(), "another writer exists in this bitcask");
    Ok(())
}

#[test]
fn reader_open_is_rejected_while_writer_exists() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let _writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    let err = Bitcask::open(&path, &[]).unwrap_err();
    assert!(matches!(err, BitcaskError::WriterExists));
    Ok(())
}

#[test]
fn writer_may_open_while_readers_present() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k", b"v")?;
    writer.close()?;

    let reader = Bitcask::open(&path, &[])?;
    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k2", b"v2")?;
    writer.close()?;
    reader.close()?;
    Ok(())
}

// --------------------- Readers and snapshots ---------------------

#[test]
fn two_readers_share_the_store() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"key2", b"value2")?;
    writer.put(b"key3", b"value3")?;
    writer.close()?;

    let r1 = Bitcask::open(&path, &[])?;
    let r2 = Bitcask::open(&path, &[])?;
    assert_eq!(r1.get(b"key2")?, b"value2");
    assert_eq!(r2.get(b"key2")?, b"value2");
    r1.close()?;
    r2.close()?;
    Ok(())
}

#[test]
fn reader_snapshot_created_and_removed() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k", b"v")?;
    writer.close()?;

    let reader = Bitcask::open(&path, &[])?;
    assert_eq!(count_snapshot_files(&path), 1);
    reader.close()?;
    assert_eq!(count_snapshot_files(&path), 0);
    Ok(())
}

#[test]
fn second_reader_loads_snapshot_instead_of_scanning() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k", b"v")?;
    writer.close()?;

    let r1 = Bitcask::open(&path, &[])?;

    // Append garbage to every data file. A full scan would now fail with
    // BadFormat, so a successful second open proves the snapshot path.
    for name in super::helpers::data_file_names(&path) {
        let mut data = fs::read(path.join(&name))?;
        data.extend_from_slice(&[b'x'; 60]);
        fs::write(path.join(&name), &data)?;
    }

    let r2 = Bitcask::open(&path, &[])?;
    assert_eq!(r2.get(b"k")?, b"v");
    r2.close()?;
    r1.close()?;
    Ok(())
}

#[test]
fn stale_readlock_without_snapshot_falls_back_to_scan() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db");

    let mut writer = Bitcask::open(&path, &[ConfigOpt::ReadWrite])?;
    writer.put(b"k", b"v")?;
    writer.close()?;

    // Simulate a reader that crashed after installing its lock but before
    // writing its snapshot.
    fs::write(path.join(".readlock1"), b"")?;

    let reader = Bitcask::open(&path, &[])?;
    assert_eq!(reader.get(b"k")?, b"v");
    reader.close()?;
    Ok(())
}
