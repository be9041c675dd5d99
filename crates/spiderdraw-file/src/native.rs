//! Spiderdraw 原生文件格式（.spdr）
//!
//! 基于 MessagePack + Zstd 的紧凑二进制格式。文件只保存配置、画布尺寸
//! 和按创建顺序排列的图元记录；关联关系在加载时通过重放创建重新推导。

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use spiderdraw_core::config::DiagramConfig;
use spiderdraw_core::diagram::Diagram;
use spiderdraw_core::geometry::Geometry;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 文件魔数 "SPDR"
const MAGIC: &[u8; 4] = b"SPDR";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// Zstd 压缩级别（1-22，3 是默认值，平衡速度和压缩比）
const COMPRESSION_LEVEL: i32 = 3;

/// 文件头（16 字节）
#[derive(Debug)]
struct FileHeader {
    magic: [u8; 4],
    version: u32,
    /// 标志位（预留）
    flags: u32,
    /// 压缩后数据长度
    compressed_size: u32,
}

impl FileHeader {
    fn new(compressed_size: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            compressed_size,
        }
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a Spiderdraw file".to_string(),
            ));
        }

        let mut buf = [0u8; 4];

        reader.read_exact(&mut buf)?;
        let version = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let flags = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let compressed_size = u32::from_le_bytes(buf);

        Ok(Self {
            magic,
            version,
            flags,
            compressed_size,
        })
    }
}

/// 可序列化的文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramFile {
    pub config: DiagramConfig,
    /// 画布尺寸；没有画布方框时为空
    pub canvas: Option<(f64, f64)>,
    /// 除画布方框外的图元，按创建顺序
    pub records: Vec<Geometry>,
}

impl DiagramFile {
    pub fn from_diagram(diagram: &Diagram) -> Self {
        Self {
            config: diagram.config().clone(),
            canvas: diagram.canvas_size(),
            records: diagram.records(),
        }
    }

    /// 重放记录，重建图表
    pub fn into_diagram(self) -> Result<Diagram, FileError> {
        Ok(Diagram::from_records(self.config, self.canvas, self.records)?)
    }
}

/// 写入任意输出
pub fn write(diagram: &Diagram, writer: &mut impl Write) -> Result<usize, FileError> {
    let content = DiagramFile::from_diagram(diagram);

    // 结构体按字段名编码，带标签的图元枚举才能正确还原
    let msgpack_data = rmp_serde::to_vec_named(&content)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;

    let size = u32::try_from(compressed_data.len())
        .map_err(|_| FileError::InvalidFormat("Diagram is too large to save".to_string()))?;
    FileHeader::new(size).write(writer)?;
    writer.write_all(&compressed_data)?;
    Ok(compressed_data.len())
}

/// 从任意输入读取
pub fn read(reader: &mut impl Read) -> Result<Diagram, FileError> {
    let header = FileHeader::read(reader)?;

    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "File version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }

    let expected = u64::from(header.compressed_size);
    let mut compressed_data = Vec::new();
    reader.by_ref().take(expected).read_to_end(&mut compressed_data)?;
    if (compressed_data.len() as u64) < expected {
        return Err(FileError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("payload truncated: {} of {} bytes", compressed_data.len(), expected),
        )));
    }

    let msgpack_data = zstd::decode_all(compressed_data.as_slice())?;
    let content: DiagramFile = rmp_serde::from_slice(&msgpack_data)?;
    content.into_diagram()
}

/// 保存图表到文件
pub fn save(diagram: &Diagram, path: &Path) -> Result<(), FileError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let compressed = write(diagram, &mut writer)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} shapes to {} ({} bytes compressed)",
        diagram.records().len(),
        path.display(),
        compressed
    );

    Ok(())
}

/// 从文件加载图表
pub fn load(path: &Path) -> Result<Diagram, FileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let diagram = read(&mut reader)?;

    tracing::info!("Loaded {} shapes from {}", diagram.len(), path.display());

    Ok(diagram)
}
