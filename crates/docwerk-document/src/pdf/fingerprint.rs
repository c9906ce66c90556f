// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-derived document identifiers for canonical PDF rewrites.

use docwerk_core::error::{DocwerkError, Result};
use lopdf::{Document, Object, StringFormat};
use sha2::{Digest, Sha256};
use tracing::debug;

/// First 16 bytes of the SHA-256 of `data`, the usual `/ID` width.
pub fn document_id(data: &[u8]) -> [u8; 16] {
    let digest = Sha256::digest(data);
    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);
    id
}

/// Serialize `doc` without an `/ID`, derive one from those bytes, stamp it
/// into the trailer, and return the final serialization.
///
/// Identical documents therefore always receive identical identifiers and
/// identical output bytes.
pub fn stamp_and_render(doc: &mut Document) -> Result<Vec<u8>> {
    doc.trailer.remove(b"ID");
    let unstamped = render(doc)?;

    let id = document_id(&unstamped).to_vec();
    debug!(id = %hex::encode(&id), "Document id derived from content");
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
    render(doc)
}

/// Serialize a document into memory.
pub fn render(doc: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| DocwerkError::PdfError(format!("failed to serialise PDF: {err}")))?;
    Ok(bytes)
}
