//! Pipeline tests: resolver and stitcher driven through `PageDownloader`.
//!
//! Tests verify:
//! - Direct results at intrinsic width are saved verbatim without tiling
//! - Caps, transport failures and downsampled results all lead to stitching
//! - Tile ordering, request variants and exact-size correction
//! - Terminal errors leave the output path untouched

use std::path::Path;

use serde_json::json;

use iiif_fetch::downloader::{DownloadMethod, DownloadOptions, PageDownloader};
use iiif_fetch::error::{DescriptorError, DownloadError, StitchError};
use iiif_fetch::info::ImageCapabilities;
use iiif_fetch::resolver::{CapLimit, CapabilityResolver, DirectOutcome};
use iiif_fetch::tile::{JpegCodec, TileGrid, TileRegion, TileStitcher};

use super::test_utils::{channel_diff, is_valid_jpeg, FakeIiif, MockIiifSource, MOCK_BASE};

fn dims(path: &Path) -> (u32, u32) {
    JpegCodec::new()
        .dimensions(&std::fs::read(path).unwrap())
        .unwrap()
}

// =============================================================================
// Direct Path
// =============================================================================

#[tokio::test]
async fn test_direct_fetch_saved_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let source = MockIiifSource::new(FakeIiif::new(1000, 700));
    let downloader = PageDownloader::new(source.clone());

    let report = downloader.download(MOCK_BASE, &output).await.unwrap();

    assert_eq!(
        report.method,
        DownloadMethod::Direct {
            url: format!("{}/full/1000,/0/default.jpg", MOCK_BASE)
        }
    );
    assert_eq!((report.width, report.height), (1000, 700));

    // Saved bytes are exactly what the server returned
    let (expected, _) = source.fake().respond("full/1000,/0/default.jpg").unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), expected);

    assert_eq!(
        source.fake().requests(),
        vec!["info.json", "full/1000,/0/default.jpg"]
    );
    assert!(source.fake().tile_requests().is_empty());
}

#[tokio::test]
async fn test_direct_falls_through_to_max() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(300, 200).rejecting_direct_size("w,");
    let source = MockIiifSource::new(fake);
    let report = PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap();

    assert_eq!(
        report.method,
        DownloadMethod::Direct {
            url: format!("{}/full/max/0/default.jpg", MOCK_BASE)
        }
    );
    assert_eq!(
        source.fake().direct_requests(),
        vec!["full/300,/0/default.jpg", "full/max/0/default.jpg"]
    );
    assert!(source.fake().tile_requests().is_empty());
}

#[tokio::test]
async fn test_resolver_accepts_with_trailing_slash_base() {
    let source = MockIiifSource::new(FakeIiif::new(300, 200));
    let caps = ImageCapabilities::new(300, 200);
    let base = format!("{}/", MOCK_BASE);

    let outcome = CapabilityResolver::new(&source, &base).resolve(&caps).await;

    match outcome {
        DirectOutcome::Accepted { url, width, height, .. } => {
            assert_eq!(url, format!("{}/full/300,/0/default.jpg", MOCK_BASE));
            assert_eq!((width, height), (300, 200));
        }
        other => panic!("Expected Accepted, got {}", other.summary()),
    }
}

#[tokio::test]
async fn test_unreadable_direct_result_is_rejected() {
    let source = MockIiifSource::new(FakeIiif::new(300, 200).with_html_direct_responses());
    let caps = ImageCapabilities::new(300, 200);

    let outcome = CapabilityResolver::new(&source, MOCK_BASE).resolve(&caps).await;
    assert!(matches!(outcome, DirectOutcome::Unreadable { .. }));
    assert_eq!(source.fake().direct_requests().len(), 1);
}

// =============================================================================
// Fallback to Stitching
// =============================================================================

#[tokio::test]
async fn test_max_width_cap_goes_straight_to_tiling() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700).with_info("maxWidth", json!(800));
    let source = MockIiifSource::new(fake);
    let downloader = PageDownloader::new(source.clone());

    let report = downloader.download(MOCK_BASE, &output).await.unwrap();

    match &report.method {
        DownloadMethod::Stitched {
            tiles,
            tile_size,
            direct,
        } => {
            assert_eq!(*tiles, 4);
            assert_eq!(*tile_size, 512);
            assert!(direct.contains("maxWidth 800 < width 1000"), "{}", direct);
        }
        other => panic!("Expected Stitched, got {:?}", other),
    }
    assert!(source.fake().direct_requests().is_empty());
    assert_eq!(dims(&output), (1000, 700));
}

#[tokio::test]
async fn test_max_area_cap_goes_straight_to_tiling() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(600, 400).with_info("maxArea", json!(100_000));
    let source = MockIiifSource::new(fake);
    let caps = iiif_fetch::info::fetch_capabilities(&source, MOCK_BASE)
        .await
        .unwrap();

    let outcome = CapabilityResolver::new(&source, MOCK_BASE)
        .resolve(&caps)
        .await;
    assert!(matches!(
        outcome,
        DirectOutcome::Infeasible(CapLimit::MaxArea {
            max: 100_000,
            area: 240_000
        })
    ));

    PageDownloader::new(source.clone())
        .download_with_capabilities(MOCK_BASE, &caps, &output)
        .await
        .unwrap();
    assert_eq!(dims(&output), (600, 400));
}

#[tokio::test]
async fn test_downsampled_direct_result_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700).with_direct_limit(800);
    let source = MockIiifSource::new(fake);
    let downloader = PageDownloader::new(source.clone());

    let report = downloader.download(MOCK_BASE, &output).await.unwrap();

    match &report.method {
        DownloadMethod::Stitched { direct, .. } => {
            assert!(direct.contains("returned width 800 < intrinsic 1000"), "{}", direct);
        }
        other => panic!("Expected Stitched, got {:?}", other),
    }

    // Only the first direct candidate is tried; a downsampled success is not retried
    assert_eq!(
        source.fake().direct_requests(),
        vec!["full/1000,/0/default.jpg"]
    );
    assert_eq!(source.fake().tile_requests().len(), 4);
    assert_eq!(dims(&output), (1000, 700));
    assert_eq!(report.width, 1000);
}

#[tokio::test]
async fn test_all_direct_candidates_fail_then_stitch() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700).rejecting_full_region();
    let source = MockIiifSource::new(fake);
    let downloader = PageDownloader::new(source.clone());

    let report = downloader.download(MOCK_BASE, &output).await.unwrap();

    assert_eq!(
        source.fake().direct_requests(),
        vec![
            "full/1000,/0/default.jpg",
            "full/max/0/default.jpg",
            "full/full/0/default.jpg",
        ]
    );
    match &report.method {
        DownloadMethod::Stitched { direct, .. } => {
            assert!(direct.starts_with("all candidates failed"), "{}", direct);
            assert!(direct.contains("HTTP 403"), "{}", direct);
        }
        other => panic!("Expected Stitched, got {:?}", other),
    }
    assert_eq!(dims(&output), (1000, 700));
}

// =============================================================================
// Tile Stitching
// =============================================================================

#[tokio::test]
async fn test_tile_requests_in_grid_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700).with_info("maxWidth", json!(500));
    let source = MockIiifSource::new(fake);
    PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap();

    assert_eq!(
        source.fake().tile_requests(),
        vec![
            "0,0,512,512/512,/0/default.jpg",
            "512,0,488,512/488,/0/default.jpg",
            "0,512,512,188/512,/0/default.jpg",
            "512,512,488,188/488,/0/default.jpg",
        ]
    );
}

#[tokio::test]
async fn test_declared_tile_size_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700)
        .with_info("maxWidth", json!(500))
        .with_tiles(256);
    let source = MockIiifSource::new(fake);
    let report = PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap();

    // ceil(1000/256) = 4 columns, ceil(700/256) = 3 rows
    assert!(matches!(
        report.method,
        DownloadMethod::Stitched {
            tiles: 12,
            tile_size: 256,
            ..
        }
    ));
    assert_eq!(source.fake().tile_requests().len(), 12);
    assert_eq!(
        source.fake().tile_requests().last().unwrap(),
        "768,512,232,188/232,/0/default.jpg"
    );
}

#[tokio::test]
async fn test_configured_default_tile_size() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(700, 300).with_info("maxHeight", json!(100));
    let source = MockIiifSource::new(fake);
    let downloader = PageDownloader::with_options(
        source.clone(),
        DownloadOptions {
            default_tile_size: 300,
        },
    );

    let report = downloader.download(MOCK_BASE, &output).await.unwrap();
    assert!(matches!(
        report.method,
        DownloadMethod::Stitched {
            tiles: 3,
            tile_size: 300,
            ..
        }
    ));
    assert_eq!(dims(&output), (700, 300));
}

#[tokio::test]
async fn test_tile_falls_back_to_percent_then_full() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(600, 300)
        .with_info("maxWidth", json!(100))
        .rejecting_tile_size("w,")
        .rejecting_tile_size("pct");
    let source = MockIiifSource::new(fake);
    PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap();

    assert_eq!(
        source.fake().tile_requests(),
        vec![
            "0,0,512,300/512,/0/default.jpg",
            "0,0,512,300/pct:100/0/default.jpg",
            "0,0,512,300/full/0/default.jpg",
            "512,0,88,300/88,/0/default.jpg",
            "512,0,88,300/pct:100/0/default.jpg",
            "512,0,88,300/full/0/default.jpg",
        ]
    );
    assert_eq!(dims(&output), (600, 300));
}

#[tokio::test]
async fn test_undersized_tiles_are_resized_to_region() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700)
        .with_info("maxWidth", json!(500))
        .shrinking_tiles();
    let source = MockIiifSource::new(fake);
    let report = PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap();

    assert_eq!((report.width, report.height), (1000, 700));
    assert_eq!(dims(&output), (1000, 700));
}

#[tokio::test]
async fn test_stitched_pixels_match_source() {
    let fake = FakeIiif::new(1000, 700);
    let source = MockIiifSource::new(fake);
    let grid = TileGrid::new(1000, 700, 512);

    let canvas = TileStitcher::new(&source, MOCK_BASE)
        .stitch(&grid)
        .await
        .unwrap();
    assert_eq!(canvas.dimensions(), (1000, 700));

    // Sample around tile seams and corners
    let page = source.fake().page();
    for &(x, y) in &[
        (0, 0),
        (511, 511),
        (512, 512),
        (999, 0),
        (0, 699),
        (999, 699),
        (700, 600),
    ] {
        let diff = channel_diff(canvas.get_pixel(x, y), page.get_pixel(x, y));
        assert!(diff <= 24, "pixel ({}, {}) differs by {}", x, y, diff);
    }
}

#[tokio::test]
async fn test_stitching_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.jpg");
    let second = dir.path().join("second.jpg");

    let fake = FakeIiif::new(1000, 700).with_info("maxWidth", json!(500));
    let downloader = PageDownloader::new(MockIiifSource::new(fake));

    downloader.download(MOCK_BASE, &first).await.unwrap();
    downloader.download(MOCK_BASE, &second).await.unwrap();

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert!(is_valid_jpeg(&a));
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_concurrent_downloads_to_distinct_paths() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.jpg");
    let second = dir.path().join("b.jpg");

    let fake = FakeIiif::new(400, 300).with_info("maxWidth", json!(100));
    let downloader = PageDownloader::new(MockIiifSource::new(fake));

    let (a, b) = tokio::join!(
        downloader.download(MOCK_BASE, &first),
        downloader.download(MOCK_BASE, &second)
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

// =============================================================================
// Terminal Failures
// =============================================================================

#[tokio::test]
async fn test_failing_tile_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let failing = TileRegion::new(512, 512, 488, 188);
    let fake = FakeIiif::new(1000, 700)
        .with_info("maxWidth", json!(500))
        .failing_region(failing);
    let source = MockIiifSource::new(fake);

    let err = PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap_err();

    match err {
        DownloadError::Stitch {
            direct,
            source: StitchError::TileExhausted { region, attempts },
        } => {
            assert!(direct.contains("maxWidth"));
            assert_eq!(region, failing);
            assert_eq!(
                attempts.urls().collect::<Vec<_>>(),
                vec![
                    format!("{}/512,512,488,188/488,/0/default.jpg", MOCK_BASE),
                    format!("{}/512,512,488,188/pct:100/0/default.jpg", MOCK_BASE),
                    format!("{}/512,512,488,188/full/0/default.jpg", MOCK_BASE),
                ]
            );
        }
        other => panic!("Expected TileExhausted, got {}", other),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_failing_tile_does_not_overwrite_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");
    std::fs::write(&output, b"earlier download").unwrap();

    let fake = FakeIiif::new(1000, 700)
        .with_direct_limit(800)
        .failing_region(TileRegion::new(512, 512, 488, 188));
    let source = MockIiifSource::new(fake);

    let result = PageDownloader::new(source)
        .download(MOCK_BASE, &output)
        .await;

    assert!(matches!(result, Err(DownloadError::Stitch { .. })));
    assert_eq!(std::fs::read(&output).unwrap(), b"earlier download");
}

#[tokio::test]
async fn test_missing_width_aborts_before_any_image_request() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let fake = FakeIiif::new(1000, 700).without_info("width");
    let source = MockIiifSource::new(fake);

    let err = PageDownloader::new(source.clone())
        .download(MOCK_BASE, &output)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DownloadError::Descriptor(DescriptorError::MissingField("width"))
    ));
    assert_eq!(source.fake().requests(), vec!["info.json"]);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_huge_descriptor_returns_error_instead_of_allocating() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let source = MockIiifSource::new(FakeIiif::new(10, 10));
    let caps = ImageCapabilities::new(u32::MAX, u32::MAX).with_max_width(1);

    let err = PageDownloader::new(source.clone())
        .download_with_capabilities(MOCK_BASE, &caps, &output)
        .await
        .unwrap_err();

    match err {
        DownloadError::Stitch {
            source: StitchError::CanvasTooLarge { width, height, .. },
            ..
        } => assert_eq!((width, height), (u32::MAX, u32::MAX)),
        other => panic!("Expected CanvasTooLarge, got {:?}", other),
    }
    assert!(source.fake().requests().is_empty());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unreachable_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.jpg");

    let source = MockIiifSource::new(FakeIiif::new(10, 10));
    let err = PageDownloader::new(source)
        .download("http://elsewhere.test/iiif/page1", &output)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::DescriptorFetch(_)));
}
