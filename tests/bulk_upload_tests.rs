mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{spawn_app, spawn_app_with};
use rust_xlsxwriter::Workbook;
use serde_json::Value;

const HEADER: &str = "Integration Key,User ID,Account ID,Email";

/// Builds an xlsx workbook whose first sheet holds `rows` beneath the standard header.
/// Cells that parse as numbers are written as numbers, like a spreadsheet user would type them.
fn xlsx(header: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, title) in header.iter().enumerate() {
        sheet
            .write_string(0, u16::try_from(col).unwrap(), *title)
            .unwrap();
    }

    for (row_index, row) in rows.iter().enumerate() {
        let row_number = u32::try_from(row_index + 1).unwrap();
        for (col, value) in row.iter().enumerate() {
            let col = u16::try_from(col).unwrap();
            if value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(number) => sheet.write_number(row_number, col, number).unwrap(),
                Err(_) => sheet.write_string(row_number, col, *value).unwrap(),
            };
        }
    }

    workbook.save_to_buffer().unwrap()
}

fn failed_errors(body: &Value) -> Vec<(u64, String)> {
    body["data"]["failed_records"]
        .as_array()
        .map(|records| {
            records
                .iter()
                .map(|r| {
                    (
                        r["row_number"].as_u64().unwrap(),
                        r["error"].as_str().unwrap().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_non_admin_is_forbidden_and_store_untouched() {
    let app = spawn_app().await;
    let (user_id, token) = app.regular_user("uploader").await;

    let csv = format!("{HEADER}\nkey-1,{user_id},1,a@example.com\n");
    let (status, body) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "PERMISSION_403");
    assert_eq!(body["status_code"], 403);
    assert_eq!(app.integration_count().await, 0);
}

#[tokio::test]
async fn test_missing_columns_abort_without_side_effects() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let admin_id = app.admin_id().await;

    let bytes = xlsx(
        &["Integration Key", "Account ID"],
        &[&["key-1", "5"]],
    );
    let (status, body) = app.upload(&token, "file", "batch.xlsx", &bytes).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "MISSING_COLUMNS");
    assert_eq!(
        body["data"]["missing_columns"],
        serde_json::json!(["User ID", "Email"])
    );
    assert_eq!(app.integration_count().await, 0);

    // Header matching is case sensitive.
    let csv = format!("integration key,User ID,Account ID,Email\nk,{admin_id},1,a@example.com\n");
    let (status, body) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "MISSING_COLUMNS");
    assert_eq!(app.integration_count().await, 0);
}

#[tokio::test]
async fn test_unreadable_files_are_invalid() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .upload(&token, "file", "batch.xlsx", b"this is not a workbook")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_FILE");

    let (status, body) = app.upload(&token, "file", "batch.csv", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_FILE");

    let (status, body) = app
        .upload(&token, "file", "report.pdf", b"%PDF-1.7 binary")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_FILE");

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/integrations/bulk-upload")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["error_code"], "INVALID_FILE");

    assert_eq!(app.integration_count().await, 0);
}

#[tokio::test]
async fn test_three_row_sheet_partially_succeeds() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let owner = app.admin_id().await.to_string();

    let bytes = xlsx(
        &["Integration Key", "User ID", "Account ID", "Email"],
        &[
            &["key-valid", &owner, "100", "valid@example.com"],
            &["key-no-email", &owner, "200", ""],
            &["key-bad-account", &owner, "abc", "bad@example.com"],
        ],
    );
    let (status, body) = app.upload(&token, "file", "batch.xlsx", &bytes).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error_code"].is_null());
    assert_eq!(body["message"], "Successfully uploaded 1 integrations");
    assert_eq!(body["data"]["success_count"], 1);
    assert_eq!(
        failed_errors(&body),
        vec![
            (2, "Email is empty".to_string()),
            (3, "Account ID must be an integer, got 'abc'".to_string()),
        ]
    );
    assert_eq!(
        body["data"]["failed_records"][1]["row"]["Integration Key"],
        "key-bad-account"
    );

    assert_eq!(app.integration_count().await, 1);

    let (status, body) = app.call("GET", "/get-all-integrations", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let stored = &body["data"][0];
    assert_eq!(stored["integration_key"], "key-valid");
    assert_eq!(stored["account_id"], 100);
    assert_eq!(stored["status"], "active");
}

#[tokio::test]
async fn test_fully_valid_csv_omits_failed_records() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let (user_id, _) = app.regular_user("customer").await;

    let csv = format!(
        "{HEADER},Notes\n\
         key-a,{user_id},1,a@example.com,first\n\
         key-b,{user_id},2,b@example.com,second\n"
    );
    let (status, body) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully uploaded 2 integrations");
    assert_eq!(body["data"]["success_count"], 2);
    assert!(body["data"].get("failed_records").is_none());
    assert_eq!(app.integration_count().await, 2);
}

#[tokio::test]
async fn test_row_failures_keep_file_order_and_cover_store_checks() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let admin_id = app.admin_id().await;

    let csv = format!(
        "{HEADER}\n\
         ,{admin_id},1,blank-key@example.com\n\
         dup,{admin_id},2,one@example.com\n\
         dup,{admin_id},3,two@example.com\n\
         orphan,987654,4,orphan@example.com\n\
         fine,{admin_id},5,fine@example.com\n\
         huge,{admin_id},99999999999,huge@example.com\n"
    );
    let (status, body) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success_count"], 2);
    assert_eq!(
        failed_errors(&body),
        vec![
            (1, "Integration Key is empty".to_string()),
            (3, "Duplicate Integration Key 'dup' (first seen in row 2)".to_string()),
            (4, "User 987654 does not exist".to_string()),
            (6, "Account ID 99999999999 is out of range".to_string()),
        ]
    );
    assert_eq!(app.integration_count().await, 2);
}

#[tokio::test]
async fn test_reupload_rejects_keys_already_stored() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let admin_id = app.admin_id().await;

    let csv = format!("{HEADER}\nrepeat-me,{admin_id},1,r@example.com\n");

    let (_, first) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;
    assert_eq!(first["data"]["success_count"], 1);

    let (status, second) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["success_count"], 0);
    assert_eq!(second["message"], "Successfully uploaded 0 integrations");
    assert_eq!(
        failed_errors(&second),
        vec![(1, "Integration Key 'repeat-me' already exists".to_string())]
    );
    assert_eq!(app.integration_count().await, 1);
}

#[tokio::test]
async fn test_file_field_fallback_and_missing_file() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let admin_id = app.admin_id().await;

    let csv = format!("{HEADER}\nfallback,{admin_id},1,f@example.com\n");
    let (status, body) = app
        .upload(&token, "spreadsheet", "batch.csv", csv.as_bytes())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success_count"], 1);

    let boundary = common::MULTIPART_BOUNDARY;
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let (status, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/integrations/bulk-upload")
                .header("Authorization", format!("Bearer {token}"))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_FILE");
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_over_size_limit_is_invalid_file() {
    let app = spawn_app_with(|config| config.import.max_upload_bytes = 1024).await;
    let token = app.admin_token().await;
    let admin_id = app.admin_id().await;

    let mut csv = format!("{HEADER}\n");
    for i in 0..200 {
        csv.push_str(&format!("big-{i},{admin_id},{i},big{i}@example.com\n"));
    }
    assert!(csv.len() > 4096);

    let (status, body) = app.upload(&token, "file", "batch.csv", csv.as_bytes()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_FILE");
    assert!(
        body["message"].as_str().unwrap().contains("1024 byte limit"),
        "unexpected message: {body}"
    );
    assert_eq!(app.integration_count().await, 0);
}
