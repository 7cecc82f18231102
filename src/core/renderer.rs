use crate::domain::model::{CertificateArtifact, PageSetup, Participant};
use crate::domain::ports::PdfEngine;
use crate::utils::error::{CertError, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 模板中代表參與者姓名的標記
pub const NAME_PLACEHOLDER: &str = "{{name}}";

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 將模板中所有的姓名標記替換成姓名，不做其他模板處理
pub fn fill_template(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, &escape_html(name))
}

fn sanitize_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}

/// `<姓名> - (<email>).pdf`，同一人重複產生會覆寫同一檔案
pub fn certificate_file_name(participant: &Participant) -> String {
    format!(
        "{} - ({}).pdf",
        sanitize_component(&participant.name),
        sanitize_component(&participant.email)
    )
}

/// 依序嘗試每個目錄，回傳第一個寫入成功的暫存 HTML
fn stage_html(dirs: &[&Path], html: &str) -> io::Result<NamedTempFile> {
    let mut last_error = None;
    for dir in dirs {
        let attempt = tempfile::Builder::new()
            .prefix(".certmail-")
            .suffix(".html")
            .tempfile_in(dir)
            .and_then(|mut file| {
                file.write_all(html.as_bytes())?;
                file.flush()?;
                Ok(file)
            });
        match attempt {
            Ok(file) => return Ok(file),
            Err(e) => {
                tracing::debug!("Cannot stage HTML in {}: {}", dir.display(), e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no staging directory")))
}

fn label(participant: &Participant) -> String {
    format!("{} <{}>", participant.name.trim(), participant.email.trim())
}

/// 用同一個 PDF 工作階段依序產生整批證書
pub struct CertificateRenderer<E: PdfEngine> {
    engine: E,
    output_dir: PathBuf,
    page_setup: PageSetup,
}

impl<E: PdfEngine> CertificateRenderer<E> {
    pub fn new(engine: E, output_dir: impl Into<PathBuf>, page_setup: PageSetup) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            page_setup,
        }
    }

    pub async fn render(
        &self,
        template: &Path,
        participant: &Participant,
    ) -> Result<CertificateArtifact> {
        let name = participant.name.trim();
        if name.is_empty() {
            return Err(CertError::render(
                label(participant),
                "participant has no name",
            ));
        }

        let content = tokio::fs::read_to_string(template).await.map_err(|e| {
            CertError::render(
                label(participant),
                format!("cannot read template {}: {}", template.display(), e),
            )
        })?;

        if !content.contains(NAME_PLACEHOLDER) {
            tracing::warn!(
                "Template {} has no {} placeholder",
                template.display(),
                NAME_PLACEHOLDER
            );
        }

        let filled = fill_template(&content, name);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                CertError::render(
                    label(participant),
                    format!("cannot create {}: {}", self.output_dir.display(), e),
                )
            })?;

        // 模板目錄優先，模板的相對路徑資源才找得到；唯讀時改放輸出目錄
        let template_dir = match template.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staged = stage_html(&[template_dir, self.output_dir.as_path()], &filled)
            .map_err(|e| {
                CertError::render(
                    label(participant),
                    format!(
                        "cannot stage HTML in {} or {}: {}",
                        template_dir.display(),
                        self.output_dir.display(),
                        e
                    ),
                )
            })?;

        let pdf = self
            .engine
            .print_pdf(staged.path(), &self.page_setup)
            .await
            .map_err(|e| match e {
                CertError::RenderError { message, .. } => {
                    CertError::render(label(participant), message)
                }
                other => CertError::render(label(participant), other.to_string()),
            })?;

        let file_path = self.output_dir.join(certificate_file_name(participant));
        tokio::fs::write(&file_path, &pdf).await.map_err(|e| {
            CertError::render(
                label(participant),
                format!("cannot write {}: {}", file_path.display(), e),
            )
        })?;

        tracing::debug!("Wrote {} ({} bytes)", file_path.display(), pdf.len());

        Ok(CertificateArtifact {
            participant: participant.clone(),
            file_path,
        })
    }
}
