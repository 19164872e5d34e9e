use std::collections::{BTreeSet, HashSet};

/// 本次运行中登记过的文件和它们的父目录，只增不减
#[derive(Debug, Default)]
pub struct Ledger {
    files: HashSet<String>,
    touched_dirs: BTreeSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, relative_path: &str) {
        self.touched_dirs.insert(parent_dir(relative_path).to_string());
        self.files.insert(relative_path.to_string());
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files.contains(relative_path)
    }

    /// 按字典序排列，根目录为空字符串
    pub fn touched_dirs(&self) -> impl Iterator<Item = &str> {
        self.touched_dirs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn parent_dir(relative_path: &str) -> &str {
    match relative_path.rfind('/') {
        Some(idx) => &relative_path[..idx],
        None => "",
    }
}
