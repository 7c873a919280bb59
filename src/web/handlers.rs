use crate::{
    image::ImageLoader,
    triage::{CaseRecord, PatientMeta},
    utils::error::TriageError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct CaseJsonRequest {
    /// Base64编码的影像数据
    pub image: String,

    /// 原始文件名
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(flatten)]
    pub patient: PatientMeta,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: &RequestId) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: request_id.0.clone(),
        }
    }

    pub fn error(code: &str, message: String, request_id: &RequestId) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message,
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: request_id.0.clone(),
        }
    }
}

/// 新建病例的响应
#[derive(Debug, Serialize)]
pub struct CaseCreated {
    pub id: Uuid,
    pub record: CaseRecord,
}

/// Multipart影像上传处理器
pub async fn create_case_upload(
    State(state): State<AppState>,
    request_id: RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<CaseCreated>>> {
    let start_time = Instant::now();
    tracing::info!("Processing multipart triage request: request_id={}", request_id.0);

    let mut upload: Option<(String, Bytes)> = None;
    let mut patient = PatientMeta::default();

    // 解析multipart数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        TriageError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/")
                        && content_type != "application/octet-stream"
                    {
                        return Err(TriageError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    return Err(TriageError::InvalidInput("No file selected".to_string()));
                }

                let data = field.bytes().await.map_err(|e| {
                    TriageError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(TriageError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} ({} bytes)", filename, data.len());
                upload = Some((filename, data));
            }
            "name" | "age" | "phone" => {
                let value = field.text().await.map_err(|e| {
                    TriageError::InvalidInput(format!("Failed to read field {}: {}", field_name, e))
                })?;
                match field_name.as_str() {
                    "name" => patient.name = Some(value),
                    "age" => patient.age = Some(value),
                    _ => patient.phone = Some(value),
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let (filename, data) = upload
        .ok_or_else(|| TriageError::InvalidInput("No file part in the request".to_string()))?;

    let created = record_case(&state, &filename, data, patient).await?;

    tracing::info!(
        "Upload triage completed: request_id={}, id={}, label={}, time={:.3}s",
        request_id.0,
        created.id,
        created.record.diagnosis_label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(created, &request_id)))
}

/// JSON base64上传处理器
pub async fn create_case_json(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(request): ValidatedJson<CaseJsonRequest>,
) -> Result<Json<ApiResponse<CaseCreated>>> {
    let start_time = Instant::now();
    tracing::info!("Processing JSON triage request: request_id={}", request_id.0);

    let bytes = ImageLoader::bytes_from_base64(&request.image)?;
    let filename = request.filename.unwrap_or_else(|| {
        let extension = ImageLoader::detect_format(&bytes)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("img");
        format!("upload.{}", extension)
    });

    let created = record_case(&state, &filename, Bytes::from(bytes), request.patient).await?;

    tracing::info!(
        "JSON triage completed: request_id={}, id={}, label={}, time={:.3}s",
        request_id.0,
        created.id,
        created.record.diagnosis_label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(created, &request_id)))
}

async fn record_case(
    state: &AppState,
    filename: &str,
    data: Bytes,
    patient: PatientMeta,
) -> Result<CaseCreated> {
    let id = state
        .pipeline
        .classify_and_record(filename, data, patient)
        .await?;

    let record = state.records().find(id).await?.ok_or_else(|| {
        TriageError::Internal(format!("case {} vanished right after creation", id))
    })?;

    Ok(CaseCreated { id, record })
}

/// 病例历史，最新在前
pub async fn list_cases(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<ApiResponse<Vec<CaseRecord>>>> {
    let records = state.records().list_recent().await?;
    tracing::debug!("Listing {} case records", records.len());
    Ok(Json(ApiResponse::success(records, &request_id)))
}

/// 单个病例
pub async fn get_case(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> Result<Response> {
    match state.records().get(&id).await? {
        Some(record) => Ok(Json(ApiResponse::success(record, &request_id)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                "NOT_FOUND",
                format!("Case record {} not found", id),
                &request_id,
            )),
        )
            .into_response()),
    }
}

/// 病例影像原始字节
pub async fn get_case_image(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> Result<Response> {
    match state.pipeline.case_image(&id).await? {
        Some((record, bytes)) => {
            let content_type = ImageLoader::detect_format(&bytes)
                .map(|format| format.to_mime_type())
                .unwrap_or("application/octet-stream");
            tracing::debug!("Serving image {} for case {}", record.image_ref, record.id);
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                "NOT_FOUND",
                format!("Case record {} not found", id),
                &request_id,
            )),
        )
            .into_response()),
    }
}

/// 删除病例及其影像（重复删除为空操作）
pub async fn delete_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.pipeline.discard(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
