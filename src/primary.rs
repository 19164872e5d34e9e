use flate2::bufread::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::types::PackageRecord;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// 打开 primary 列表，根据文件头判断 gzip / zstd / 未压缩。
/// xz 和 bzip2 压缩的列表不支持，直接返回错误
pub fn open_listing(path: &Path) -> Result<PackageStream<Box<dyn BufRead + Send>>> {
    let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 6];
    let head = reader.fill_buf().map_err(|e| SyncError::io(path, e))?;
    let len = head.len().min(magic.len());
    magic[..len].copy_from_slice(&head[..len]);

    let source: Box<dyn BufRead + Send> = if magic.starts_with(&GZIP_MAGIC) {
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else if magic.starts_with(&XZ_MAGIC) || magic.starts_with(&BZIP2_MAGIC) {
        return Err(SyncError::metadata(
            path.display().to_string(),
            "unsupported compression",
        ));
    } else if magic.starts_with(&ZSTD_MAGIC) {
        let decoder =
            zstd::stream::read::Decoder::with_buffer(reader).map_err(|e| SyncError::io(path, e))?;
        Box::new(BufReader::new(decoder))
    } else {
        Box::new(reader)
    };

    Ok(PackageStream::new(source, path.display().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Arch,
    Size,
}

#[derive(Default)]
struct PartialPackage {
    href: Option<String>,
    arch: Option<String>,
    size: Option<u64>,
}

impl PartialPackage {
    /// 处理 `package` 的直接子元素，返回需要读取文本的字段
    fn visit_child(&mut self, e: &BytesStart) -> std::result::Result<Option<TextField>, quick_xml::Error> {
        match e.local_name().as_ref() {
            b"location" => {
                if let Some(attr) = e.try_get_attribute("href")? {
                    self.href = Some(attr.unescape_value()?.into_owned());
                }
                Ok(None)
            }
            b"arch" => Ok(Some(TextField::Arch)),
            b"size" => {
                if let Some(attr) = e.try_get_attribute("package")? {
                    self.size = attr.unescape_value()?.trim().parse().ok();
                }
                Ok(self.size.is_none().then_some(TextField::Size))
            }
            _ => Ok(None),
        }
    }

    fn set_text(&mut self, field: TextField, text: &str) {
        match field {
            TextField::Arch => self.arch = Some(text.trim().to_string()),
            TextField::Size => self.size = text.trim().parse().ok(),
        }
    }

    fn finish(self, file: &str) -> Result<PackageRecord> {
        let relative_path = self
            .href
            .ok_or_else(|| SyncError::metadata(file, "package without location"))?;
        Ok(PackageRecord {
            relative_path,
            arch: self.arch.unwrap_or_default(),
            size: self.size,
        })
    }
}

/// 逐个产出 `package` 记录的拉取式解析器。
///
/// 只保留当前软件包的字段，事件缓冲区在每个事件前清空，
/// 因此内存占用与列表中的软件包数量无关。
pub struct PackageStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    file: String,
    finished: bool,
}

impl<R: BufRead> PackageStream<R> {
    pub fn new(source: R, file: impl Into<String>) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            file: file.into(),
            finished: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<PackageRecord>> {
        let mut current: Option<PartialPackage> = None;
        // 当前软件包内的元素深度，0 表示直接位于 package 下
        let mut depth = 0usize;
        let mut text_field: Option<TextField> = None;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| SyncError::xml(self.file.as_str(), e))?;

            match event {
                Event::Start(e) => match current.as_mut() {
                    Some(package) => {
                        depth += 1;
                        if depth == 1 {
                            text_field = package
                                .visit_child(&e)
                                .map_err(|e| SyncError::xml(self.file.as_str(), e))?;
                        }
                    }
                    None if e.local_name().as_ref() == b"package" => {
                        current = Some(PartialPackage::default());
                        depth = 0;
                    }
                    None => {}
                },
                Event::Empty(e) => {
                    if let Some(package) = current.as_mut() {
                        if depth == 0 {
                            package
                                .visit_child(&e)
                                .map_err(|e| SyncError::xml(self.file.as_str(), e))?;
                        }
                    }
                }
                Event::Text(text) => {
                    if let (Some(package), Some(field)) = (current.as_mut(), text_field) {
                        let text = text
                            .unescape()
                            .map_err(|e| SyncError::xml(self.file.as_str(), e))?;
                        package.set_text(field, &text);
                    }
                }
                Event::End(_) => {
                    text_field = None;
                    if current.is_some() {
                        if depth == 0 {
                            if let Some(package) = current.take() {
                                return package.finish(&self.file).map(Some);
                            }
                        }
                        depth -= 1;
                    }
                }
                Event::Eof => {
                    if current.is_some() {
                        return Err(SyncError::metadata(
                            self.file.as_str(),
                            "listing ends inside a package element",
                        ));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for PackageStream<R> {
    type Item = Result<PackageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
