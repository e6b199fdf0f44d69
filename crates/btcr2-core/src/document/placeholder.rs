//! Placeholder ↔ bound document transformation (SPEC_FULL §3, §9).
//!
//! Modeled as a single generic substitution walk over the handful of
//! fields that can carry a DID, rather than duplicated per-relationship
//! code: `id`, `controller[*]`, `verificationMethod[*].{id,controller}`,
//! every relationship-array entry (embedded or referenced), and
//! `service[*].id`.

use crate::document::model::{Document, RelationshipEntry};
use crate::identifier::{METHOD, PLACEHOLDER_TAIL};

/// `did:btcr2:xxxx…` (60 `x`), the literal placeholder used in
/// intermediate documents.
pub fn placeholder_did() -> String {
    format!("did:{}:{}", METHOD, PLACEHOLDER_TAIL)
}

/// Replace every occurrence of `PLACEHOLDER_DID` with `did` across the
/// document's self-referencing fields.
pub fn bind(doc: &Document, did: &str) -> Document {
    substitute(doc, &placeholder_did(), did)
}

/// The inverse of `bind`: replace every occurrence of `doc.id` with the
/// placeholder DID.
pub fn unbind(doc: &Document) -> Document {
    let did = doc.id.clone();
    substitute(doc, &did, &placeholder_did())
}

fn substitute(doc: &Document, from: &str, to: &str) -> Document {
    let mut out = doc.clone();
    out.id = out.id.replace(from, to);
    if let Some(controllers) = out.controller.as_mut() {
        for c in controllers.iter_mut() {
            *c = c.replace(from, to);
        }
    }
    for vm in out.verification_method.iter_mut() {
        vm.id = vm.id.replace(from, to);
        vm.controller = vm.controller.replace(from, to);
    }
    for list in [
        &mut out.authentication,
        &mut out.assertion_method,
        &mut out.capability_invocation,
        &mut out.capability_delegation,
        &mut out.key_agreement,
    ] {
        for entry in list.iter_mut() {
            substitute_relationship_entry(entry, from, to);
        }
    }
    for svc in out.service.iter_mut() {
        svc.id = svc.id.replace(from, to);
    }
    out
}

fn substitute_relationship_entry(entry: &mut RelationshipEntry, from: &str, to: &str) {
    match entry {
        RelationshipEntry::Reference(url) => *url = url.replace(from, to),
        RelationshipEntry::Embedded(vm) => {
            vm.id = vm.id.replace(from, to);
            vm.controller = vm.controller.replace(from, to);
        }
    }
}
