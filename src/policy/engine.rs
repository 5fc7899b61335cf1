//! The policy evaluator.
//!
//! Evaluation is pure and stateless: the decision depends only on the
//! request and the pre-resolved lookups. Every refusal path returns `Deny`
//! rather than an error, so nothing malformed can bypass a check.

use crate::policy::rules::{
    rules_for, CollectionRules, CreateRule, EnumConstraint, FieldPolicy, ReadRule, UpdateRule,
};
use crate::policy::types::{
    AccessRequest, Collection, Decision, FieldValue, Lookups, Operation, Snapshot,
};

/// Decide whether the request is permitted.
///
/// Cross-document state the rules depend on (the chat participant list for
/// message operations) must be resolved into `lookups` beforehand; see
/// [`chat_dependency`]. An unresolved lookup denies.
pub fn evaluate(req: &AccessRequest, lookups: &Lookups) -> Decision {
    // Undeclared collections (including `_`-prefixed system names) are
    // denied outright.
    let Some(collection) = Collection::parse(&req.collection) else {
        return Decision::Deny;
    };

    // Every declared rule requires an authenticated identity with a uid.
    let Some(uid) = req.identity.uid() else {
        return Decision::Deny;
    };

    let rules = rules_for(collection);
    match req.operation {
        Operation::Read => eval_read(rules, uid, req.existing.as_ref(), lookups),
        Operation::List => eval_list(rules),
        Operation::Create => eval_create(rules, uid, req, lookups),
        Operation::Update => eval_update(rules, uid, req),
        // No delete rule is declared anywhere in the set: default deny.
        Operation::Delete => Decision::Deny,
    }
}

/// The chat id whose participant list must be resolved before evaluating
/// this request, if any. Message reads consult the existing document's
/// `chatId`, message creates the proposed one.
pub fn chat_dependency(req: &AccessRequest) -> Option<&str> {
    if Collection::parse(&req.collection) != Some(Collection::Messages) {
        return None;
    }
    match req.operation {
        Operation::Read => req.existing.as_ref()?.str_field("chatId"),
        Operation::Create => req.proposed.as_ref()?.str_field("chatId"),
        _ => None,
    }
}

fn eval_read(
    rules: &CollectionRules,
    uid: &str,
    existing: Option<&Snapshot>,
    lookups: &Lookups,
) -> Decision {
    // Reading a document that does not exist is refused under every rule.
    let Some(existing) = existing else {
        return Decision::Deny;
    };
    match rules.read {
        ReadRule::AnyAuthenticated => Decision::Allow,
        ReadRule::OwnerField(field) => Decision::allow_if(existing.str_field(field) == Some(uid)),
        ReadRule::ChatParticipant => participant_decision(lookups, uid),
    }
}

/// List is permitted only where the per-document read predicate holds for
/// every member. Owner- and participant-scoped reads have no enumerable
/// predicate, so only "any authenticated" collections list at all.
fn eval_list(rules: &CollectionRules) -> Decision {
    Decision::allow_if(rules.read == ReadRule::AnyAuthenticated)
}

fn eval_create(
    rules: &CollectionRules,
    uid: &str,
    req: &AccessRequest,
    lookups: &Lookups,
) -> Decision {
    // Create may not overwrite an existing document.
    if req.existing.is_some() {
        return Decision::Deny;
    }
    let Some(proposed) = req.proposed.as_ref() else {
        return Decision::Deny;
    };
    if !enums_satisfied(rules.enums, proposed) {
        return Decision::Deny;
    }
    match rules.create {
        CreateRule::Denied => Decision::Deny,
        CreateRule::SelfOwned(field) => {
            if proposed.str_field(field) != Some(uid) {
                return Decision::Deny;
            }
            if rules.doc_id_is_owner {
                if let Some(id) = req.document_id.as_deref() {
                    if id != uid {
                        return Decision::Deny;
                    }
                }
            }
            Decision::Allow
        }
        CreateRule::SelfInList(field) => Decision::allow_if(
            proposed
                .str_list_field(field)
                .is_some_and(|members| members.iter().any(|m| m == uid)),
        ),
        CreateRule::ChatParticipant => participant_decision(lookups, uid),
    }
}

fn eval_update(rules: &CollectionRules, uid: &str, req: &AccessRequest) -> Decision {
    // Updating a document that was never created is refused.
    let Some(existing) = req.existing.as_ref() else {
        return Decision::Deny;
    };
    let Some(proposed) = req.proposed.as_ref() else {
        return Decision::Deny;
    };

    let eligible = match rules.update {
        UpdateRule::Denied => return Decision::Deny,
        UpdateRule::OwnerField(field) => existing.str_field(field) == Some(uid),
        UpdateRule::MemberOfList(field) => existing
            .str_list_field(field)
            .is_some_and(|members| members.iter().any(|m| m == uid)),
    };
    if !eligible {
        return Decision::Deny;
    }
    if !fields_satisfied(rules.fields, existing, proposed) {
        return Decision::Deny;
    }
    Decision::allow_if(enums_satisfied(rules.enums, proposed))
}

fn participant_decision(lookups: &Lookups, uid: &str) -> Decision {
    // A missing chat document or unresolved lookup fails closed.
    match &lookups.chat_participants {
        Some(participants) => Decision::allow_if(participants.iter().any(|p| p == uid)),
        None => Decision::Deny,
    }
}

/// A field counts as unchanged if both sides agree, both sides are absent,
/// or the proposed side is a server-assigned token (the store supplies the
/// literal, so there is nothing meaningful to compare).
fn unchanged(old: Option<&FieldValue>, new: Option<&FieldValue>) -> bool {
    match (old, new) {
        (_, Some(FieldValue::ServerAssigned(_))) => true,
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        // Removing a constrained field, or introducing a value that was
        // absent at creation, is a change.
        (None, Some(_)) | (Some(_), None) => false,
    }
}

fn fields_satisfied(policy: FieldPolicy, existing: &Snapshot, proposed: &Snapshot) -> bool {
    match policy {
        FieldPolicy::Immutable(fields) => fields
            .iter()
            .all(|f| unchanged(existing.get(f), proposed.get(f))),
        FieldPolicy::MutableOnly(allowed) => existing
            .field_names()
            .chain(proposed.field_names())
            .filter(|f| !allowed.contains(f))
            .all(|f| unchanged(existing.get(f), proposed.get(f))),
    }
}

fn enums_satisfied(constraints: &[EnumConstraint], proposed: &Snapshot) -> bool {
    // The server-timestamp exemption covers presence and immutability only;
    // an enumerated field must be a string literal from its value set, so a
    // token (which materializes into a timestamp) is a violation.
    constraints.iter().all(|c| match proposed.get(c.field) {
        None => !c.required,
        Some(value) => value.as_str().is_some_and(|s| c.allowed.contains(&s)),
    })
}
