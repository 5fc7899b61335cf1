//! The declared rule set: one static rule record per collection.
//!
//! The five collections are fixed and exhaustive, so rules are plain data
//! dispatched off the `Collection` enum rather than a generic path matcher.

use crate::policy::types::Collection;

/// The 16 canonical MBTI personality-type codes.
pub const MBTI_TYPES: &[&str] = &[
    "ISTJ", "ISFJ", "INFJ", "INTJ", "ISTP", "ISFP", "INFP", "INTP", "ESTP", "ESFP", "ENFP", "ENTP",
    "ESTJ", "ESFJ", "ENFJ", "ENTJ",
];

/// Accepted values for a recommendation's `actionTaken` field.
pub const RECOMMENDATION_ACTIONS: &[&str] = &["accepted", "rejected"];

/// Who may read a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRule {
    /// Any authenticated identity.
    AnyAuthenticated,
    /// Only the identity named by this field of the existing document.
    OwnerField(&'static str),
    /// Only a participant of the chat referenced by the document's `chatId`.
    ChatParticipant,
}

/// Who may create a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateRule {
    /// Never through this surface (backend/administrative writes only).
    Denied,
    /// The proposed document must name the requester in this field.
    SelfOwned(&'static str),
    /// The requester must appear in this string-list field of the proposed
    /// document.
    SelfInList(&'static str),
    /// The requester must be a participant of the chat referenced by the
    /// proposed document's `chatId`.
    ChatParticipant,
}

/// Who may update a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// Immutable once created.
    Denied,
    /// Only the identity named by this field of the existing document.
    OwnerField(&'static str),
    /// Only identities listed in this string-list field of the existing
    /// document.
    MemberOfList(&'static str),
}

/// Change constraints applied between `existing` and `proposed` on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// The named fields must be unchanged; everything else may vary.
    Immutable(&'static [&'static str]),
    /// Only the named fields may change; everything else must be unchanged.
    MutableOnly(&'static [&'static str]),
}

/// A fixed value set for one field, enforced on every accepted write.
#[derive(Debug, Clone, Copy)]
pub struct EnumConstraint {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
    /// Whether the field must be present in every proposed snapshot. A
    /// missing required field is a value-domain violation, not an error.
    pub required: bool,
}

/// The complete rule record for one collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionRules {
    pub read: ReadRule,
    pub create: CreateRule,
    pub update: UpdateRule,
    pub fields: FieldPolicy,
    pub enums: &'static [EnumConstraint],
    /// The document id doubles as the owner uid (users collection): a
    /// create naming a different document id is refused even if the
    /// proposed fields check out.
    pub doc_id_is_owner: bool,
}

static USERS: CollectionRules = CollectionRules {
    read: ReadRule::AnyAuthenticated,
    create: CreateRule::SelfOwned("uid"),
    update: UpdateRule::OwnerField("uid"),
    fields: FieldPolicy::Immutable(&["uid", "email", "createdAt"]),
    enums: &[EnumConstraint {
        field: "mbtiType",
        allowed: MBTI_TYPES,
        required: true,
    }],
    doc_id_is_owner: true,
};

// Recommendations are produced by the backend pipeline; clients only read
// them and record whether they were seen and acted on.
static RECOMMENDATIONS: CollectionRules = CollectionRules {
    read: ReadRule::OwnerField("userId"),
    create: CreateRule::Denied,
    update: UpdateRule::OwnerField("userId"),
    fields: FieldPolicy::MutableOnly(&["viewedAt", "actionTaken"]),
    enums: &[EnumConstraint {
        field: "actionTaken",
        allowed: RECOMMENDATION_ACTIONS,
        required: false,
    }],
    doc_id_is_owner: false,
};

// Chat membership is fixed at creation: the participant list itself is
// immutable, so eligibility never grows after the fact.
static CHATS: CollectionRules = CollectionRules {
    read: ReadRule::AnyAuthenticated,
    create: CreateRule::SelfInList("participants"),
    update: UpdateRule::MemberOfList("participants"),
    fields: FieldPolicy::Immutable(&["chatId", "createdBy", "createdAt", "participants"]),
    enums: &[],
    doc_id_is_owner: false,
};

static MESSAGES: CollectionRules = CollectionRules {
    read: ReadRule::ChatParticipant,
    create: CreateRule::ChatParticipant,
    update: UpdateRule::OwnerField("senderId"),
    fields: FieldPolicy::Immutable(&["messageId", "chatId", "senderId", "createdAt"]),
    enums: &[],
    doc_id_is_owner: false,
};

static MBTI_TESTS: CollectionRules = CollectionRules {
    read: ReadRule::OwnerField("userId"),
    create: CreateRule::SelfOwned("userId"),
    update: UpdateRule::Denied,
    fields: FieldPolicy::Immutable(&[]),
    enums: &[EnumConstraint {
        field: "result",
        allowed: MBTI_TYPES,
        required: true,
    }],
    doc_id_is_owner: false,
};

/// The rule record for a declared collection.
pub fn rules_for(collection: Collection) -> &'static CollectionRules {
    match collection {
        Collection::Users => &USERS,
        Collection::Recommendations => &RECOMMENDATIONS,
        Collection::Chats => &CHATS,
        Collection::Messages => &MESSAGES,
        Collection::MbtiTests => &MBTI_TESTS,
    }
}
