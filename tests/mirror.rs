use flate2::write::GzEncoder;
use flate2::Compression;
use httpmock::prelude::*;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use rrepo_mirror::{Config, Mirror, SourceLocation, SyncError};

struct Package<'a> {
    href: &'a str,
    arch: &'a str,
    size: usize,
}

const PACKAGES: [Package<'static>; 2] = [
    Package {
        href: "pkgs/a-1.0.x86_64.rpm",
        arch: "x86_64",
        size: 1000,
    },
    Package {
        href: "pkgs/b-1.0.noarch.rpm",
        arch: "noarch",
        size: 2000,
    },
];

fn primary_gz(packages: &[Package]) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">"#,
    );
    for package in packages {
        xml.push_str(&format!(
            r#"<package type="rpm"><arch>{}</arch><size package="{}" installed="1"/><location href="{}"/><format><rpm:license>MIT</rpm:license></format></package>"#,
            package.arch, package.size, package.href
        ));
    }
    xml.push_str("</metadata>");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn repomd(primary_size: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <revision>1</revision>
  <data type="primary">
    <checksum type="sha256">0000</checksum>
    <location href="repodata/primary.xml.gz"/>
    <size>{}</size>
  </data>
</repomd>
"#,
        primary_size
    )
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn upstream_repo(packages: &[Package]) -> TempDir {
    let upstream = TempDir::new().unwrap();
    let primary = primary_gz(packages);
    write(upstream.path(), "repodata/primary.xml.gz", &primary);
    write(upstream.path(), "repodata/repomd.xml", repomd(primary.len()).as_bytes());
    for package in packages {
        write(upstream.path(), package.href, &vec![0u8; package.size]);
    }
    upstream
}

fn local_config(upstream: &TempDir, clone: &TempDir, arches: &[&str]) -> Config {
    let mut config = Config::new(
        SourceLocation::LocalPath(upstream.path().to_path_buf()),
        clone.path(),
    );
    config.arches = arches.iter().map(|arch| arch.to_string()).collect();
    config
}

fn size_of(root: &TempDir, relative: &str) -> Option<u64> {
    std::fs::metadata(root.path().join(relative)).ok().map(|m| m.len())
}

#[tokio::test]
async fn arch_filtered_clone_fetches_only_matching_packages() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();

    let mut mirror = Mirror::new(local_config(&upstream, &clone, &["x86_64"])).unwrap();
    let counters = mirror.run().await.unwrap();

    assert!(size_of(&clone, "repodata/repomd.xml").is_some());
    assert!(size_of(&clone, "repodata/primary.xml.gz").is_some());
    assert_eq!(size_of(&clone, "pkgs/a-1.0.x86_64.rpm"), Some(1000));
    assert_eq!(size_of(&clone, "pkgs/b-1.0.noarch.rpm"), None);
    assert!(!mirror.ledger().contains("pkgs/b-1.0.noarch.rpm"));

    // primary.xml.gz 和 x86_64 软件包，repomd.xml 属于刷新
    assert_eq!(counters.new_files, 2);
    assert_eq!(counters.refreshed_files, 1);
    assert_eq!(counters.new_files + counters.refreshed_files, 3);
    // 上游没有 repomd.xml.asc / repomd.xml.key
    assert_eq!(counters.failed_files, 2);
    assert!(mirror.ledger().contains("repodata/repomd.xml.asc"));
    assert_eq!(counters.deleted_files, 0);
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();

    Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await
        .unwrap();
    let second = Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(second.new_files, 0);
    assert_eq!(second.deleted_files, 0);
    assert_eq!(size_of(&clone, "pkgs/b-1.0.noarch.rpm"), Some(2000));
}

#[tokio::test]
async fn truncated_package_is_fetched_again() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();
    Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    write(clone.path(), "pkgs/a-1.0.x86_64.rpm", &[0u8; 10]);
    let counters = Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(counters.new_files, 1);
    assert_eq!(size_of(&clone, "pkgs/a-1.0.x86_64.rpm"), Some(1000));
}

#[tokio::test]
async fn stale_files_are_pruned_within_touched_dirs_only() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();
    write(clone.path(), "pkgs/old-0.9.x86_64.rpm", b"old");
    write(clone.path(), "repodata/1234-primary.xml.gz", b"old");
    write(clone.path(), "isos/unrelated.iso", b"keep");

    let counters = Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(counters.deleted_files, 2);
    assert_eq!(size_of(&clone, "pkgs/old-0.9.x86_64.rpm"), None);
    assert_eq!(size_of(&clone, "repodata/1234-primary.xml.gz"), None);
    assert_eq!(size_of(&clone, "isos/unrelated.iso"), Some(4));
}

#[tokio::test]
async fn noclean_keeps_stale_files() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();
    write(clone.path(), "pkgs/old-0.9.x86_64.rpm", b"old");

    let mut config = local_config(&upstream, &clone, &[]);
    config.clean = false;
    let counters = Mirror::new(config).unwrap().run().await.unwrap();

    assert_eq!(counters.deleted_files, 0);
    assert!(size_of(&clone, "pkgs/old-0.9.x86_64.rpm").is_some());
}

#[tokio::test]
async fn missing_primary_aborts_the_run() {
    let upstream = TempDir::new().unwrap();
    write(
        upstream.path(),
        "repodata/repomd.xml",
        br#"<repomd><data type="other"><location href="repodata/other.xml.gz"/></data></repomd>"#,
    );
    let clone = TempDir::new().unwrap();

    let result = Mirror::new(local_config(&upstream, &clone, &[]))
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(SyncError::MissingPrimary)));
}

#[tokio::test]
async fn offline_clean_prunes_undeclared_files() {
    let upstream = upstream_repo(&PACKAGES);
    let clone = TempDir::new().unwrap();
    Mirror::new(local_config(&upstream, &clone, &["x86_64"]))
        .unwrap()
        .run()
        .await
        .unwrap();
    write(clone.path(), "pkgs/old-0.9.x86_64.rpm", b"old");

    let mut mirror = Mirror::new(Config::offline(clone.path())).unwrap();
    let counters = mirror.run().await.unwrap();

    // 离线模式登记所有架构：b 缺失，asc / key 缺失
    assert_eq!(counters.failed_files, 3);
    assert_eq!(counters.deleted_files, 1);
    assert!(mirror.ledger().contains("pkgs/b-1.0.noarch.rpm"));
    assert_eq!(size_of(&clone, "pkgs/old-0.9.x86_64.rpm"), None);
    assert_eq!(size_of(&clone, "pkgs/a-1.0.x86_64.rpm"), Some(1000));
}

fn http_config(server: &MockServer, clone: &TempDir) -> Config {
    let source = SourceLocation::parse(&format!("{}/repo", server.base_url())).unwrap();
    let mut config = Config::new(source, clone.path());
    config.retries = 2;
    config.retry_delay = Duration::ZERO;
    config.request_timeout = Some(Duration::from_secs(5));
    config
}

fn serve_metadata(server: &MockServer, packages: &[Package]) {
    let primary = primary_gz(packages);
    let index = repomd(primary.len());
    server.mock(|when, then| {
        when.method(GET).path("/repo/repodata/repomd.xml");
        then.status(200).body(index);
    });
    server.mock(|when, then| {
        when.method(GET).path("/repo/repodata/primary.xml.gz");
        then.status(200).body(primary);
    });
}

#[tokio::test]
async fn http_clone_continues_after_retry_exhaustion() {
    let packages = [
        Package {
            href: "pkgs/c-1.0.x86_64.rpm",
            arch: "x86_64",
            size: 300,
        },
        Package {
            href: "pkgs/d-1.0.x86_64.rpm",
            arch: "x86_64",
            size: 400,
        },
        Package {
            href: "pkgs/e-1.0.aarch64.rpm",
            arch: "aarch64",
            size: 500,
        },
    ];
    let server = MockServer::start_async().await;
    serve_metadata(&server, &packages);
    let signature = server.mock(|when, then| {
        when.method(GET).path("/repo/repodata/repomd.xml.asc");
        then.status(404);
    });
    let flaky = server.mock(|when, then| {
        when.method(GET).path("/repo/pkgs/c-1.0.x86_64.rpm");
        then.status(502);
    });
    let healthy = server.mock(|when, then| {
        when.method(GET).path("/repo/pkgs/d-1.0.x86_64.rpm");
        then.status(200).body(vec![1u8; 400]);
    });
    let filtered = server.mock(|when, then| {
        when.method(GET).path("/repo/pkgs/e-1.0.aarch64.rpm");
        then.status(200).body(vec![1u8; 500]);
    });

    let clone = TempDir::new().unwrap();
    write(clone.path(), "pkgs/stale.rpm", b"old");
    let mut config = http_config(&server, &clone);
    config.arches = ["x86_64".to_string()].into_iter().collect();
    let mut mirror = Mirror::new(config).unwrap();
    let counters = mirror.run().await.unwrap();

    // 可选文件只尝试一次
    signature.assert_hits(1);
    flaky.assert_hits(2);
    healthy.assert_hits(1);
    filtered.assert_hits(0);

    // c 失败，asc / key 失败
    assert_eq!(counters.failed_files, 3);
    assert_eq!(counters.new_files, 2);
    assert!(mirror.ledger().contains("pkgs/c-1.0.x86_64.rpm"));
    assert_eq!(size_of(&clone, "pkgs/d-1.0.x86_64.rpm"), Some(400));
    assert_eq!(size_of(&clone, "pkgs/stale.rpm"), None);
    assert_eq!(counters.deleted_files, 1);
}

#[tokio::test]
async fn http_fatal_status_aborts_the_run() {
    let packages = [Package {
        href: "pkgs/forbidden.rpm",
        arch: "x86_64",
        size: 10,
    }];
    let server = MockServer::start_async().await;
    serve_metadata(&server, &packages);
    server.mock(|when, then| {
        when.method(GET).path("/repo/pkgs/forbidden.rpm");
        then.status(403);
    });

    let clone = TempDir::new().unwrap();
    write(clone.path(), "pkgs/stale.rpm", b"old");
    let result = Mirror::new(http_config(&server, &clone)).unwrap().run().await;

    assert!(matches!(
        result,
        Err(SyncError::FatalStatus { status: 403, .. })
    ));
    // 中止时不执行清理
    assert!(size_of(&clone, "pkgs/stale.rpm").is_some());
}
