use crate::api::types::{field_text, CategorizedData, Document, FieldMap, ProcessedDocument};
use crate::session::Session;

use super::FieldRow;

/// `date_of_birth` → `Date Of Birth`.
///
/// Underscores become spaces; each run of letters starts upper-case and
/// continues lower-case.
pub fn humanize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for c in name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn document_link(name: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{}]({})", name, url),
        None => name.to_string(),
    }
}

fn render_fields(out: &mut String, fields: &FieldMap) {
    for (name, value) in fields {
        out.push_str(&format!(
            "- **{}:** `{}`\n",
            humanize_field_name(name),
            field_text(value)
        ));
    }
}

pub fn render_session(session: &Session) -> String {
    match &session.user {
        Some(user) if session.is_authenticated => {
            format!("Logged in as **{}** (`{}`)", user.email, user.id)
        }
        _ => "Not logged in.".to_string(),
    }
}

pub fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No documents found.".to_string();
    }

    let mut out = format!("**Processed Documents** ({})\n", documents.len());
    for doc in documents {
        out.push_str(&format!("\n**Document: {}**\n", doc.file_name));
        out.push_str(&format!(
            "Type: {} | Processed: {}\n",
            doc.document_type,
            doc.processed_at_display()
        ));
        if let Some(url) = &doc.pdf_url {
            out.push_str(&format!("[View Original PDF]({})\n", url));
        }
        if doc.fields.is_empty() {
            out.push_str("_No fields extracted for this document._\n");
        } else {
            render_fields(&mut out, &doc.fields);
        }
    }
    out
}

/// The field list. `search` is only used for the heading.
pub fn render_field_rows(rows: &[FieldRow], search: &str) -> String {
    if rows.is_empty() {
        return if search.is_empty() {
            "No fields extracted yet.".to_string()
        } else {
            "No matches found. Try using different search terms.".to_string()
        };
    }

    let mut out = if search.is_empty() {
        format!("**All Fields** ({})\n", rows.len())
    } else {
        format!("**Found {} matches for** `{}`\n", rows.len(), search)
    };
    for row in rows {
        out.push_str(&format!(
            "- **{}:** `{}` · {}\n",
            humanize_field_name(&row.field_name),
            row.field_value,
            document_link(&row.document_name, row.pdf_url.as_deref())
        ));
    }
    out
}

pub fn render_categories(data: &CategorizedData) -> String {
    if data.is_empty() {
        return "No categorized fields yet. Upload a document first.".to_string();
    }

    let mut out = String::from("**Categorized Fields**\n");
    for category in data.categories.iter().filter(|c| !c.fields.is_empty()) {
        out.push_str(&format!("\n**{}**\n", category.name));
        render_fields(&mut out, &category.fields);
    }
    out
}

pub fn render_processed(file_name: &str, processed: &ProcessedDocument) -> String {
    let mut out = format!("Document **{}** processed successfully!\n", file_name);
    if let Some(url) = &processed.pdf_url {
        out.push_str(&format!("[View Original PDF]({})\n", url));
    }
    if processed.fields.is_empty() {
        out.push_str("_No fields extracted._\n");
    } else {
        out.push('\n');
        render_fields(&mut out, &processed.fields);
    }
    out
}

/// Extracted fields as a downloadable JSON file: `(file name, contents)`.
///
/// `passport.pdf` becomes `passport_data.json`. Field order is kept.
pub fn fields_export(
    file_name: &str,
    fields: &FieldMap,
) -> Result<(String, String), serde_json::Error> {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let json = serde_json::to_string_pretty(fields)?;
    Ok((format!("{}_data.json", stem), json))
}

/// Split `text` into Discord-sized chunks, preferring newline then space breaks.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut chunk_len = remaining.len().min(max_len);
        while !remaining.is_char_boundary(chunk_len) {
            chunk_len -= 1;
        }
        if chunk_len == 0 {
            chunk_len = remaining.chars().next().map_or(1, char::len_utf8);
        }
        let split_at = if chunk_len < remaining.len() {
            remaining[..chunk_len]
                .rfind('\n')
                .or_else(|| remaining[..chunk_len].rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(chunk_len)
        } else {
            chunk_len
        };
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}
