//! Scan and repair runs over a temp install and the in-memory client.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gamescan_archive::GzipCodec;
use gamescan_fetch::MemoryClient;
use gamescan_repair::{
    Error, ErrorKind, GameFileInfo, GameFilesInfo, GameScanner, GameVersion, RepairObserver, RepairProgress,
    RepairStep, RepairSummary, ScanMode, ScanProgress, ScannerConfig,
};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Recorder {
    repair:   Arc<Mutex<Vec<RepairProgress>>>,
    scan:     Arc<Mutex<Vec<ScanProgress>>>,
    repaired: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn steps(&self) -> Vec<RepairStep> {
        let mut steps: Vec<_> = self.repair.lock().unwrap().iter().map(|p| p.step).collect();
        steps.dedup();
        steps
    }
}

impl RepairObserver for Recorder {
    fn on_scan_progress(&self, progress: &ScanProgress) { self.scan.lock().unwrap().push(progress.clone()); }

    fn on_repair_progress(&self, progress: &RepairProgress) { self.repair.lock().unwrap().push(progress.clone()); }

    fn on_file_repaired(&self, file: &GameFileInfo) { self.repaired.lock().unwrap().push(file.file_name.clone()); }
}

struct Fixture {
    dir:      TempDir,
    client:   Arc<MemoryClient>,
    recorder: Recorder,
}

impl Fixture {
    fn new() -> Self { Self::with_client(MemoryClient::new()) }

    fn with_client(client: MemoryClient) -> Self {
        Self {
            dir:      TempDir::new().unwrap(),
            client:   Arc::new(client),
            recorder: Recorder::default(),
        }
    }

    fn root(&self) -> std::path::PathBuf { self.dir.path().join("game") }

    fn temp(&self) -> std::path::PathBuf { self.dir.path().join("temp") }

    fn config(&self) -> ScannerConfig {
        ScannerConfig::new(self.root())
            .temp_root(self.temp())
            .cache_root(self.dir.path().join("cache"))
            .chunked_threshold(u64::MAX)
            .tick_interval(Duration::from_millis(5))
    }

    fn scanner(&self, config: ScannerConfig) -> GameScanner<MemoryClient, GzipCodec> {
        GameScanner::new(self.client.clone(), GzipCodec, config)
            .unwrap()
            .observer(self.recorder.clone())
    }

    /// Registers `served` under a URL for `name` and describes `content` as
    /// the installed form.
    fn serve(&self, name: &str, content: &[u8], served: &[u8]) -> GameFileInfo {
        let url = format!("mem://cdn/{}", name.replace('\\', "/"));
        self.client.insert(url.clone(), served.to_vec());
        GameFileInfo {
            file_name: name.into(),
            crc32:     crc32fast::hash(content),
            size:      content.len() as u64,
            http_link: url,
            bin_crc32: crc32fast::hash(served),
            bin_size:  served.len() as u64,
        }
    }

    fn install(&self, name: &str, content: &[u8]) {
        let path = self.root().join(name.replace('\\', "/"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn installed(&self, name: &str) -> Option<Vec<u8>> { std::fs::read(self.root().join(name.replace('\\', "/"))).ok() }
}

fn manifest(files: impl IntoIterator<Item = GameFileInfo>) -> GameFilesInfo {
    let mut info = GameFilesInfo::new(GameVersion::new(4, 0, 0, 6148));
    for file in files {
        info.insert(file);
    }
    info
}

fn payload(len: usize) -> Vec<u8> { (0..len).map(|i| (i.wrapping_mul(7) % 253) as u8).collect() }

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn is_empty_dir(path: &Path) -> bool { std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true) }

#[tokio::test]
async fn test_intact_file_is_not_downloaded() {
    let fx = Fixture::new();
    let data = payload(3_000);
    let file = fx.serve("Game.exe", &data, &data);
    fx.install("Game.exe", &data);

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([file])).await.unwrap();
    let summary = scanner.scan_and_repair().await.unwrap();

    assert_eq!(summary, RepairSummary { checked: 1, repaired: 0 });
    assert!(fx.client.requests().is_empty());
    assert_eq!(fx.recorder.steps(), [RepairStep::Check, RepairStep::End]);
    let repair = fx.recorder.repair.lock().unwrap();
    assert!(repair.iter().any(|p| p.step == RepairStep::Check && p.percent == 100.0));
    assert!(fx.recorder.repaired.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_checksum_mismatch_discards_download() {
    let fx = Fixture::new();
    let expected = b"expected content";
    let mut file = fx.serve("Game.exe", expected, b"corrupted bytes!");
    file.bin_crc32 = crc32fast::hash(expected);
    fx.install("Game.exe", b"old");

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([file])).await.unwrap();
    let err = scanner.scan_and_repair().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
    assert_eq!(err.file_name(), Some("Game.exe"));
    assert_eq!(fx.installed("Game.exe").unwrap(), b"old");
    assert!(is_empty_dir(&fx.temp()));
}

#[tokio::test]
async fn test_missing_file_is_repaired_single_stream() {
    let fx = Fixture::new();
    let data = payload(5_000);
    let file = fx.serve("data\\Maps\\a.map", &data, &data);

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([file])).await.unwrap();
    let summary = scanner.scan_and_repair().await.unwrap();

    assert_eq!(summary, RepairSummary { checked: 1, repaired: 1 });
    assert_eq!(fx.installed("data\\Maps\\a.map").unwrap(), data);
    assert_eq!(*fx.recorder.repaired.lock().unwrap(), ["data\\Maps\\a.map"]);
    assert_eq!(
        fx.recorder.steps(),
        [RepairStep::Check, RepairStep::Download, RepairStep::CheckDownload, RepairStep::Finalize, RepairStep::End]
    );

    let requests = fx.client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].range, None);
    assert!(is_empty_dir(&fx.temp()));

    let scan = fx.recorder.scan.lock().unwrap();
    assert_eq!(scan.last().unwrap().percent, 100.0);
}

#[tokio::test]
async fn test_large_file_uses_chunked_engine() {
    let fx = Fixture::new();
    let data = payload(10_000);
    let file = fx.serve("Game.exe", &data, &data);
    let config = fx.config().chunked_threshold(1_000).chunk_size_limit(4_096).max_workers(2);

    let scanner = fx.scanner(config);
    scanner.initialize(manifest([file])).await.unwrap();
    scanner.scan_and_repair().await.unwrap();

    assert_eq!(fx.installed("Game.exe").unwrap(), data);
    let ranges: Vec<_> = fx.client.requests().into_iter().filter_map(|r| r.range).collect();
    assert_eq!(ranges.len(), 3);
    assert!(ranges.iter().any(|r| r == "bytes=8192-9999"));

    let downloads: Vec<_> = fx
        .recorder
        .repair
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.step == RepairStep::Download)
        .map(|p| p.overall())
        .collect();
    assert!(downloads.iter().all(|p| (10.0..=55.0).contains(p)));
}

#[tokio::test]
async fn test_compressed_artifact_is_extracted() {
    let fx = Fixture::new();
    let data = payload(50_000);
    let file = fx.serve("art\\textures.bar", &data, &gzip(&data));

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([file])).await.unwrap();
    scanner.scan_and_repair().await.unwrap();

    assert_eq!(fx.installed("art\\textures.bar").unwrap(), data);
    let steps = fx.recorder.steps();
    assert!(steps.contains(&RepairStep::Extract));
    assert!(steps.contains(&RepairStep::CheckExtract));
    assert!(is_empty_dir(&fx.temp()));
}

#[tokio::test]
async fn test_extracted_checksum_mismatch() {
    let fx = Fixture::new();
    let data = payload(2_000);
    let mut file = fx.serve("Game.exe", &data, &gzip(&data));
    file.crc32 ^= 1;

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([file])).await.unwrap();
    let err = scanner.scan_and_repair().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
    assert!(fx.installed("Game.exe").is_none());
    assert!(is_empty_dir(&fx.temp()));
}

#[tokio::test]
async fn test_nested_files_repaired_first() {
    let fx = Fixture::new();
    let names = ["Game.exe", "data\\b.bar", "Art\\x.dds", "data\\a.bar", "Launcher.dll"];
    let files: Vec<_> = names.iter().map(|n| fx.serve(n, n.as_bytes(), n.as_bytes())).collect();

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest(files)).await.unwrap();
    let summary = scanner.scan_and_repair().await.unwrap();

    assert_eq!(summary.repaired, 5);
    assert_eq!(
        *fx.recorder.repaired.lock().unwrap(),
        ["Art\\x.dds", "data\\a.bar", "data\\b.bar", "Game.exe", "Launcher.dll"]
    );
}

#[tokio::test]
async fn test_failure_stops_run_and_keeps_earlier_repairs() {
    let fx = Fixture::new();
    let good = fx.serve("data\\a.bar", b"good", b"good");
    let missing = GameFileInfo {
        file_name: "Game.exe".into(),
        crc32:     1,
        size:      1,
        http_link: "mem://cdn/absent".into(),
        bin_crc32: 1,
        bin_size:  1,
    };
    let later = fx.serve("Zlast.dll", b"later", b"later");

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([good, missing, later])).await.unwrap();
    let err = scanner.scan_and_repair().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.file_name(), Some("Game.exe"));
    assert_eq!(fx.installed("data\\a.bar").unwrap(), b"good");
    assert!(fx.installed("Zlast.dll").is_none());
}

#[tokio::test]
async fn test_quick_and_full_scan() {
    let fx = Fixture::new();
    let a = fx.serve("a.bar", b"aaaa", b"aaaa");
    let b = fx.serve("data\\b.bar", b"bbbb", b"bbbb");
    fx.install("a.bar", b"aaaa");

    let scanner = fx.scanner(fx.config());
    scanner.initialize(manifest([a, b])).await.unwrap();
    assert!(!scanner.scan(ScanMode::Quick).await.unwrap());

    fx.install("data\\b.bar", b"bbbb");
    assert!(scanner.scan(ScanMode::Quick).await.unwrap());
    assert!(scanner.scan(ScanMode::Full).await.unwrap());

    // same size, different content
    fx.install("data\\b.bar", b"BBBB");
    assert!(scanner.scan(ScanMode::Quick).await.unwrap());
    assert!(!scanner.scan(ScanMode::Full).await.unwrap());

    let scan = fx.recorder.scan.lock().unwrap();
    assert_eq!(scan.first().unwrap().index, 0);
    assert!(scan.iter().all(|p| p.total == 2));
    assert!(fx.client.requests().is_empty());
}

#[tokio::test]
async fn test_initialize_rules() {
    let fx = Fixture::new();
    let scanner = fx.scanner(fx.config());

    assert!(matches!(scanner.scan(ScanMode::Quick).await, Err(Error::NotInitialized)));
    assert!(matches!(scanner.scan_and_repair().await, Err(Error::NotInitialized)));
    assert!(matches!(
        scanner.initialize(GameFilesInfo::new(GameVersion::default())).await,
        Err(Error::InvalidArgument(_))
    ));

    std::fs::create_dir_all(fx.temp()).unwrap();
    std::fs::write(fx.temp().join("stale.tmp"), "x").unwrap();
    let file = fx.serve("a.bar", b"a", b"a");
    scanner.initialize(manifest([file.clone()])).await.unwrap();
    assert!(is_empty_dir(&fx.temp()));

    assert!(matches!(
        scanner.initialize(manifest([file])).await,
        Err(Error::AlreadyInitialized)
    ));
    assert_eq!(scanner.files().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_run_rejected_and_abort_cancels() {
    let fx = Fixture::with_client(MemoryClient::new().piece_size(100).read_delay(Duration::from_millis(5)));
    let data = payload(20_000);
    let file = fx.serve("Game.exe", &data, &data);

    let scanner = Arc::new(fx.scanner(fx.config()));
    scanner.initialize(manifest([file])).await.unwrap();

    let running = scanner.clone();
    let handle = tokio::spawn(async move { running.scan_and_repair().await });

    for _ in 0..200 {
        if fx.recorder.steps().contains(&RepairStep::Download) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(scanner.is_running());
    assert!(matches!(scanner.scan(ScanMode::Quick).await, Err(Error::AlreadyRunning)));
    assert!(matches!(scanner.scan_and_repair().await, Err(Error::AlreadyRunning)));

    scanner.abort();
    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(!scanner.is_running());
    assert!(fx.installed("Game.exe").is_none());
    assert!(is_empty_dir(&fx.temp()));

    // idle abort is a no-op and the scanner stays usable
    scanner.abort();
    assert!(!scanner.scan(ScanMode::Quick).await.unwrap());
}
