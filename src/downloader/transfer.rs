//! 流式写盘
//!
//! 远程数据块大小不固定，这里统一切成固定大小的分片写入文件，
//! 每写完一片回调一次，进度计数因此以分片为粒度单调增长。

use crate::catalog::AudioStream;
use crate::error::TransferError;
use futures::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 把音频流写入 `path`，返回写入的总字节数
///
/// `on_chunk` 在每个分片落盘后以分片长度调用
pub async fn write_stream<F>(
    stream: AudioStream,
    path: &Path,
    chunk_size: usize,
    mut on_chunk: F,
) -> Result<u64, TransferError>
where
    F: FnMut(u64),
{
    let chunk_size = chunk_size.max(1);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = File::create(path).await?;

    let mut body = stream.body;
    let mut pending: Vec<u8> = Vec::with_capacity(chunk_size * 2);
    let mut written = 0u64;
    let mut chunks = 0usize;

    while let Some(piece) = body.next().await {
        pending.extend_from_slice(&piece?);

        let mut offset = 0;
        while pending.len() - offset >= chunk_size {
            file.write_all(&pending[offset..offset + chunk_size]).await?;
            offset += chunk_size;
            written += chunk_size as u64;
            chunks += 1;
            on_chunk(chunk_size as u64);
        }
        pending.drain(..offset);
    }

    // 尾部不足一片的剩余数据
    if !pending.is_empty() {
        file.write_all(&pending).await?;
        written += pending.len() as u64;
        chunks += 1;
        on_chunk(pending.len() as u64);
    }

    file.flush().await?;
    debug!("写入完成 {:?}: {} bytes, {} 片", path, written, chunks);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    fn audio(pieces: Vec<Result<Vec<u8>, TransferError>>) -> AudioStream {
        AudioStream {
            content_length: None,
            body: stream::iter(pieces).boxed(),
        }
    }

    #[tokio::test]
    async fn test_rechunks_uneven_pieces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.mp3");
        let pieces = vec![Ok(vec![1u8; 3]), Ok(vec![2u8; 10]), Ok(vec![3u8; 1])];

        let mut sizes = Vec::new();
        let total = write_stream(audio(pieces), &path, 4, |n| sizes.push(n))
            .await
            .unwrap();

        assert_eq!(total, 14);
        assert_eq!(sizes, vec![4, 4, 4, 2]);

        let content = tokio::fs::read(&path).await.unwrap();
        assert_eq!(content.len(), 14);
        assert_eq!(&content[..4], &[1, 1, 1, 2]);
        assert_eq!(content[13], 3);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("2.mp3");

        let mut calls = 0;
        let total = write_stream(audio(Vec::new()), &path, 8, |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(total, 0);
        assert_eq!(calls, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stream_error_is_propagated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("3.mp3");
        let pieces = vec![
            Ok(vec![0u8; 16]),
            Err(TransferError::Stream("connection reset".to_string())),
        ];

        let mut seen = 0;
        let err = write_stream(audio(pieces), &path, 8, |n| seen += n)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Stream(_)));
        assert_eq!(seen, 16);
    }
}
