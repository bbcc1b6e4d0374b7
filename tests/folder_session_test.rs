use anyhow::Result;
use httpmock::prelude::*;
use hfs_client::{HfsClient, SessionFile, UploadMode, UploadSummary};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn photo_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("photos");
    fs::create_dir_all(root.join("2024")).unwrap();
    fs::create_dir_all(root.join("drafts")).unwrap();
    fs::write(root.join("cover.jpg"), b"cover").unwrap();
    fs::write(root.join("2024/beach.jpg"), b"beach").unwrap();
    dir
}

#[tokio::test]
async fn test_upload_folder_puts_every_file_under_remote_root() -> Result<()> {
    let server = MockServer::start_async().await;
    let cover = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/backup/photos/cover.jpg")
                .query_param("existing", "skip");
            then.status(201);
        })
        .await;
    let beach = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/backup/photos/2024/beach.jpg")
                .query_param("existing", "skip");
            then.status(409);
        })
        .await;
    // 空資料夾 drafts 需要另外建立
    let folders = server
        .mock_async(|when, then| {
            when.method(POST).path("/~/api/create_folder");
            then.status(200).body("{}");
        })
        .await;

    let dir = photo_tree();
    let client = HfsClient::with_base_url(&server.base_url())?;
    let summary = client
        .upload(&dir.path().join("photos"), "/backup", UploadMode::Skip, None)
        .await?;

    cover.assert_async().await;
    beach.assert_async().await;
    // photos, drafts
    folders.assert_hits_async(2).await;

    match summary {
        UploadSummary::Folder(report) => {
            assert_eq!(report.remote_root, "/backup/photos");
            assert_eq!(report.uploaded.len(), 1);
            assert_eq!(report.skipped.len(), 1);
            assert!(report.is_success());
            assert_eq!(report.created_folders, vec!["/backup/photos/drafts"]);
            assert_eq!(report.total_bytes(), 5);
        }
        other => panic!("expected a folder report, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_upload_folder_keeps_going_after_server_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/photos/cover.jpg");
            then.status(507).body("disk full");
        })
        .await;
    let beach = server
        .mock_async(|when, then| {
            when.method(PUT).path("/photos/2024/beach.jpg");
            then.status(201);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/~/api/create_folder");
            then.status(409);
        })
        .await;

    let dir = photo_tree();
    let client = HfsClient::with_base_url(&server.base_url())?;
    let report = client
        .upload_folder(&dir.path().join("photos"), "/", UploadMode::Overwrite)
        .await?;

    beach.assert_async().await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].remote_path, "/photos/cover.jpg");
    assert!(report.failed[0].reason.contains("507"));
    assert!(!report.is_success());
    Ok(())
}

#[tokio::test]
async fn test_upload_folder_survives_forbidden_folder_creation() -> Result<()> {
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(PUT).path_contains("/backup/photos/");
            then.status(201);
        })
        .await;
    let ancestor = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/~/api/create_folder")
                .json_body(json!({ "uri": "/", "name": "backup" }));
            then.status(403);
        })
        .await;
    let root = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/~/api/create_folder")
                .json_body(json!({ "uri": "/backup", "name": "photos" }));
            then.status(403).body("forbidden");
        })
        .await;

    let dir = photo_tree();
    let client = HfsClient::with_base_url(&server.base_url())?;
    let report = client
        .upload_folder(&dir.path().join("photos"), "/backup", UploadMode::Skip)
        .await?;

    upload.assert_hits_async(2).await;
    ancestor.assert_hits_async(0).await;
    root.assert_async().await;

    assert_eq!(report.uploaded.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.failed_folders.len(), 1);
    assert_eq!(report.failed_folders[0].remote_path, "/backup/photos");
    assert!(report.failed_folders[0].reason.contains("403"));
    assert!(!report.is_success());
    Ok(())
}

#[tokio::test]
async fn test_saved_session_is_replayed() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/").query_param_exists("login");
            then.status(200)
                .header("Set-Cookie", "hfs_http=persisted; path=/; HttpOnly");
        })
        .await;
    let listing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/~/api/get_file_list")
                .header("Cookie", "hfs_http=persisted");
            then.status(200)
                .body("data: {\"list\":[{\"n\":\"notes.txt\",\"s\":12}],\"can_upload\":true}\n\n");
        })
        .await;

    let dir = TempDir::new()?;
    let session_path = dir.path().join("state/session.json");

    let first = HfsClient::with_base_url(&server.base_url())?;
    first.authorize("admin", "secret").await?;
    SessionFile::new(server.base_url(), first.cookie_jar()).save(&session_path)?;

    // 新的 client 只靠檔案裡的 cookie
    let restored = SessionFile::load_for(&session_path, &server.base_url())?
        .expect("session should match the server");
    let second = HfsClient::with_base_url(&server.base_url())?;
    second.set_cookie_jar(restored.cookies);

    let entries = second.list("/").await?;
    listing.assert_async().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "notes.txt");

    assert!(SessionFile::load_for(&session_path, "http://elsewhere:8080")?.is_none());
    SessionFile::delete(&session_path)?;
    assert!(!session_path.exists());
    Ok(())
}
