#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dexscan_core::{BinaryModel, InputTensor, LoadedPackage, Result, ScanError};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip archive in memory with the given entries, in order.
pub fn apk(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A stored (uncompressed) archive holding `classes.dex` with one data byte
/// flipped after the checksum was written.
pub fn apk_with_corrupt_dex() -> Vec<u8> {
    let dex: Vec<u8> = (0..64u32).map(|i| (i * 37 + 11) as u8).collect();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("classes.dex", stored).unwrap();
    writer.write_all(&dex).unwrap();
    let mut archive = writer.finish().unwrap().into_inner();

    let offset = archive
        .windows(dex.len())
        .position(|window| window == &dex[..])
        .unwrap();
    archive[offset + 10] ^= 0xFF;
    archive
}

/// A package with a manifest and one `.dex` section filled with `byte`.
pub fn package_with_dex(id: &str, byte: u8) -> LoadedPackage {
    let dex = vec![byte; 4096];
    LoadedPackage::new(
        id,
        apk(&[
            ("AndroidManifest.xml", b"<manifest/>"),
            ("classes.dex", &dex[..]),
        ]),
    )
}

/// Scores an image by its mean intensity, so an all-0xFF section scores 1.0
/// and an all-zero section scores 0.0. Counts calls.
#[derive(Clone, Default)]
pub struct MeanModel {
    pub calls: Arc<AtomicUsize>,
}

impl MeanModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BinaryModel for MeanModel {
    fn predict(&self, input: &InputTensor) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sum: f32 = input.as_slice().iter().sum();
        Ok(sum / input.len() as f32)
    }
}

/// Fails on the first call, then behaves like [`MeanModel`].
#[derive(Clone, Default)]
pub struct FailFirstModel {
    pub inner: MeanModel,
}

impl BinaryModel for FailFirstModel {
    fn predict(&self, input: &InputTensor) -> Result<f32> {
        if self.inner.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ScanError::Inference("interpreter crashed".into()));
        }
        let sum: f32 = input.as_slice().iter().sum();
        Ok(sum / input.len() as f32)
    }
}
