use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::constants::{
    PRIMARY_SUFFIXES, PRIMARY_TYPE, REPOMD_KEY_PATH, REPOMD_PATH, REPOMD_SIGNATURE_PATH,
};
use crate::error::{Result, SyncError};
use crate::fetcher::FetchPolicy;
use crate::mirror::Mirror;
use crate::types::RepoEntry;

/// repomd.xml 中的一个 `data` 元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub data_type: Option<String>,
    pub entry: RepoEntry,
}

impl IndexEntry {
    pub fn is_primary(&self) -> bool {
        self.data_type.as_deref() == Some(PRIMARY_TYPE)
            || PRIMARY_SUFFIXES
                .iter()
                .any(|suffix| self.entry.relative_path.ends_with(suffix))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIndex {
    pub auxiliary_files: Vec<RepoEntry>,
    pub primary_listing: String,
}

/// 下载并解析仓库索引，按声明顺序获取其中的每个元数据文件
pub async fn load_index(mirror: &mut Mirror) -> Result<RepoIndex> {
    mirror
        .fetch(&RepoEntry::unknown_size(REPOMD_PATH), FetchPolicy::HEAD)
        .await?;

    let path = mirror.destination().join(REPOMD_PATH);
    let file = File::open(&path).map_err(|e| SyncError::io(&path, e))?;
    let entries = parse_repomd(BufReader::new(file), REPOMD_PATH)?;
    let primary_listing = select_primary(&entries)?;
    info!("{} declares {} metadata files", REPOMD_PATH, entries.len());

    let mut auxiliary_files = Vec::with_capacity(entries.len());
    for IndexEntry { entry, .. } in entries {
        mirror.fetch(&entry, FetchPolicy::REQUIRED).await?;
        auxiliary_files.push(entry);
    }

    // 分离签名和公钥在很多仓库中并不存在
    for optional in [REPOMD_SIGNATURE_PATH, REPOMD_KEY_PATH] {
        mirror
            .fetch(&RepoEntry::unknown_size(optional), FetchPolicy::OPTIONAL_HEAD)
            .await?;
    }

    Ok(RepoIndex {
        auxiliary_files,
        primary_listing,
    })
}

pub fn select_primary(entries: &[IndexEntry]) -> Result<String> {
    let mut primary: Option<&str> = None;
    for entry in entries.iter().filter(|entry| entry.is_primary()) {
        if let Some(first) = primary {
            return Err(SyncError::AmbiguousPrimary(
                first.to_string(),
                entry.entry.relative_path.clone(),
            ));
        }
        primary = Some(&entry.entry.relative_path);
    }
    primary.map(str::to_string).ok_or(SyncError::MissingPrimary)
}

#[derive(Default)]
struct PartialData {
    data_type: Option<String>,
    href: Option<String>,
    size: Option<u64>,
}

/// 解析 repomd.xml。大小可以是 `<size>` 的文本，也可以是属性；
/// 缺失或无法解析时视为未知。
pub fn parse_repomd<R: BufRead>(source: R, file: &str) -> Result<Vec<IndexEntry>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<PartialData> = None;
    let mut in_size = false;

    loop {
        buf.clear();
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| SyncError::xml(file, e))?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"data" => {
                    current = Some(start_data(&e).map_err(|e| SyncError::xml(file, e))?);
                }
                b"location" => {
                    if let Some(data) = current.as_mut() {
                        visit_location(&e, data).map_err(|e| SyncError::xml(file, e))?;
                    }
                }
                b"size" => in_size = current.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"location" => {
                    if let Some(data) = current.as_mut() {
                        visit_location(&e, data).map_err(|e| SyncError::xml(file, e))?;
                    }
                }
                b"data" => {
                    return Err(SyncError::metadata(file, "data element without location"));
                }
                _ => {}
            },
            Event::Text(text) if in_size => {
                if let Some(data) = current.as_mut() {
                    let text = text.unescape().map_err(|e| SyncError::xml(file, e))?;
                    data.size = data.size.or_else(|| text.trim().parse().ok());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"size" => in_size = false,
                b"data" => {
                    let Some(data) = current.take() else {
                        continue;
                    };
                    let href = data
                        .href
                        .ok_or_else(|| SyncError::metadata(file, "data element without location"))?;
                    debug!("index entry {} ({:?})", href, data.data_type);
                    entries.push(IndexEntry {
                        data_type: data.data_type,
                        entry: RepoEntry::new(href, data.size),
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn start_data(e: &BytesStart) -> std::result::Result<PartialData, quick_xml::Error> {
    let mut data = PartialData::default();
    if let Some(attr) = e.try_get_attribute("type")? {
        data.data_type = Some(attr.unescape_value()?.into_owned());
    }
    if let Some(attr) = e.try_get_attribute("size")? {
        data.size = attr.unescape_value()?.trim().parse().ok();
    }
    Ok(data)
}

fn visit_location(e: &BytesStart, data: &mut PartialData) -> std::result::Result<(), quick_xml::Error> {
    if let Some(attr) = e.try_get_attribute("href")? {
        data.href = Some(attr.unescape_value()?.into_owned());
    }
    if data.size.is_none() {
        if let Some(attr) = e.try_get_attribute("size")? {
            data.size = attr.unescape_value()?.trim().parse().ok();
        }
    }
    Ok(())
}
