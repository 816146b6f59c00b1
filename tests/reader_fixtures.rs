use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunkio::{IoConfig, IoRuntime, LocalGroup, ParallelReader, partition};
use tempfile::TempDir;

fn fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// (chunk_size, first_item_offset, first_byte_offset, chunk) per rank.
async fn char_geometry(path: &Path, group_size: usize, extras: u64) -> Vec<(u64, u64, u64, Vec<u8>)> {
    let path = path.to_path_buf();
    LocalGroup::new(group_size)
        .run(move |runtime| {
            let path = path.clone();
            async move {
                let mut reader = ParallelReader::<u8, _>::open(Arc::clone(&runtime), &path, IoConfig::default()).await?;
                let chunk = reader.read_chunk_plus(extras).await?;
                let row = (
                    reader.chunk_size(),
                    reader.first_item_offset(),
                    reader.first_byte_offset(),
                    chunk,
                );
                reader.close().await?;
                Ok(row)
            }
        })
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_chars_layout_per_group_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "5chars.bin", b"abcde\n");

    let expected: [&[(u64, u64)]; 5] = [
        &[(5, 0)],
        &[(3, 0), (2, 3)],
        &[(2, 0), (2, 2), (1, 4)],
        &[(2, 0), (1, 2), (1, 3), (1, 4)],
        &[(1, 0), (1, 1), (1, 2), (1, 3), (1, 4)],
    ];

    for (index, want) in expected.iter().enumerate() {
        let rows = char_geometry(&path, index + 1, 0).await;
        let got: Vec<(u64, u64)> = rows.iter().map(|(size, first, _, _)| (*size, *first)).collect();
        assert_eq!(got, want.to_vec(), "group of {}", index + 1);
        for (size, first, first_byte, chunk) in rows {
            assert_eq!(first_byte, first);
            assert_eq!(chunk.len() as u64, size);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_six_chars_with_extras() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "6chars.bin", b"abcdef\n");

    let rows = char_geometry(&path, 3, 1).await;
    let chunks: Vec<Vec<u8>> = rows.into_iter().map(|row| row.3).collect();
    assert_eq!(chunks, vec![b"abc".to_vec(), b"cde".to_vec(), b"ef".to_vec()]);

    let rows = char_geometry(&path, 3, 2).await;
    let chunks: Vec<Vec<u8>> = rows.into_iter().map(|row| row.3).collect();
    assert_eq!(chunks, vec![b"abcd".to_vec(), b"cdef".to_vec(), b"ef".to_vec()]);

    let rows = char_geometry(&path, 4, 2).await;
    let sizes: Vec<u64> = rows.iter().map(|row| row.0).collect();
    assert_eq!(sizes, vec![4, 4, 2, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_boundary_extension_finds_straddling_matches() {
    let needle = b"needle";
    let mut haystack = Vec::new();
    for i in 0..200u32 {
        haystack.extend_from_slice(format!("{i:04}-").as_bytes());
        if i % 17 == 3 {
            haystack.extend_from_slice(needle);
        }
    }
    let sequential = haystack.windows(needle.len()).filter(|w| *w == needle).count();
    haystack.push(b'\n');

    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "haystack.bin", &haystack);

    for group_size in [2, 3, 5, 7] {
        let path = path.clone();
        let counts = LocalGroup::new(group_size)
            .run(move |runtime| {
                let path = path.clone();
                async move {
                    let mut reader = ParallelReader::<u8, _>::open(Arc::clone(&runtime), &path, IoConfig::default()).await?;
                    let chunk = reader.read_chunk_plus(needle.len() as u64 - 1).await?;
                    let own = partition(runtime.group_rank(), runtime.group_size(), reader.total_items())?;
                    // Count only matches that start inside this participant's own range.
                    let found = chunk
                        .windows(needle.len())
                        .enumerate()
                        .filter(|(at, window)| (*at as u64) < own.len() && *window == needle)
                        .count();
                    reader.close().await?;
                    Ok(found)
                }
            })
            .await
            .unwrap();

        assert_eq!(counts.iter().sum::<usize>(), sequential, "group of {group_size}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_twelve_ints_layout() {
    let dir = tempfile::tempdir().unwrap();
    let bytes: Vec<u8> = (1..=12i32).flat_map(|v| v.to_ne_bytes()).collect();
    let path = fixture(&dir, "12ints.bin", &bytes);

    let rows = LocalGroup::new(5)
        .run(move |runtime| {
            let path = path.clone();
            async move {
                let mut reader = ParallelReader::<i32, _>::open(Arc::clone(&runtime), &path, IoConfig::default()).await?;
                let chunk = reader.read_chunk().await?;
                let row = (reader.chunk_size(), reader.first_byte_offset(), chunk);
                reader.close().await?;
                Ok(row)
            }
        })
        .await
        .unwrap();

    let layout: Vec<(u64, u64)> = rows.iter().map(|(size, byte, _)| (*size, *byte)).collect();
    assert_eq!(layout, vec![(3, 0), (3, 12), (2, 24), (2, 32), (2, 40)]);
    let all: Vec<i32> = rows.into_iter().flat_map(|(_, _, chunk)| chunk).collect();
    assert_eq!(all, (1..=12).collect::<Vec<i32>>());
}
