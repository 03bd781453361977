//! Typed classification rules.
//!
//! # Responsibilities
//! - Build the weighted distribution rule for a policy
//! - Build the per-interface mark rule
//! - Render rules as nft command text and as `nftables` schema objects
//!
//! # Design Decisions
//! - Flows are hashed on source address, source MAC, L4 protocol and source port
//! - The hash modulus is the sum of member ratios; each member owns a
//!   contiguous range sized by its ratio, starting at 0
//! - Zero-ratio members get no range; an all-zero sum is an error
//! - A modulus that does not fit in 32 bits is an error, never a wrap

use std::borrow::Cow;
use std::fmt;

use nftables::{expr, schema, stmt, types};
use thiserror::Error;

use crate::config::settings::{Interface, TableFamily, TableSpec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("ratios of policy {policy} sum to zero")]
    ZeroRatioSum { policy: String },
    #[error("policy {0} admits no interface")]
    Empty(String),
    #[error("ratios of policy {policy} overflow the hash modulus")]
    RatioOverflow { policy: String },
}

pub(crate) fn nf_family(family: TableFamily) -> types::NfFamily {
    match family {
        TableFamily::Ip => types::NfFamily::IP,
        TableFamily::Ip6 => types::NfFamily::IP6,
        TableFamily::Inet => types::NfFamily::INet,
    }
}

fn payload(protocol: &'static str, field: &'static str) -> expr::Expression<'static> {
    expr::Expression::Named(expr::NamedExpression::Payload(expr::Payload::PayloadField(
        expr::PayloadField {
            protocol: Cow::Borrowed(protocol),
            field: Cow::Borrowed(field),
        },
    )))
}

fn meta(key: expr::MetaKey) -> expr::Expression<'static> {
    expr::Expression::Named(expr::NamedExpression::Meta(expr::Meta { key }))
}

/// Packet fields fed to the flow hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashField {
    IpSaddr,
    EtherSaddr,
    MetaL4Proto,
    ThSport,
}

pub const FLOW_HASH_FIELDS: [HashField; 4] = [
    HashField::IpSaddr,
    HashField::EtherSaddr,
    HashField::MetaL4Proto,
    HashField::ThSport,
];

impl HashField {
    fn as_str(&self) -> &'static str {
        match self {
            HashField::IpSaddr => "ip saddr",
            HashField::EtherSaddr => "ether saddr",
            HashField::MetaL4Proto => "meta l4proto",
            HashField::ThSport => "th sport",
        }
    }

    fn expression(self) -> expr::Expression<'static> {
        match self {
            HashField::IpSaddr => payload("ip", "saddr"),
            HashField::EtherSaddr => payload("ether", "saddr"),
            HashField::MetaL4Proto => meta(expr::MetaKey::L4proto),
            HashField::ThSport => payload("th", "sport"),
        }
    }
}

/// A chain inside a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRef {
    pub family: TableFamily,
    pub table: String,
    pub chain: String,
}

impl ChainRef {
    pub fn new(table: &TableSpec, chain: impl Into<String>) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            chain: chain.into(),
        }
    }

    pub fn to_schema(&self) -> schema::Chain<'static> {
        schema::Chain {
            family: nf_family(self.family),
            table: Cow::Owned(self.table.clone()),
            name: Cow::Owned(self.chain.clone()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.family, self.table, self.chain)
    }
}

/// One hash bucket range and the chain it jumps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchArm {
    pub first: u32,
    pub last: u32,
    pub target: String,
}

/// `jhash <fields> mod <modulus> vmap { first-last : goto target, ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub fields: Vec<HashField>,
    pub modulus: u32,
    pub arms: Vec<DispatchArm>,
}

impl Dispatch {
    /// Partition `[0, sum(ratio))` among `members` in order.
    pub fn weighted(policy: &str, members: &[&Interface]) -> Result<Self, PolicyError> {
        if members.is_empty() {
            return Err(PolicyError::Empty(policy.to_string()));
        }

        let overflow = || PolicyError::RatioOverflow {
            policy: policy.to_string(),
        };
        let modulus = members
            .iter()
            .try_fold(0u32, |sum, m| sum.checked_add(m.ratio))
            .ok_or_else(overflow)?;
        if modulus == 0 {
            return Err(PolicyError::ZeroRatioSum {
                policy: policy.to_string(),
            });
        }

        let mut arms = Vec::with_capacity(members.len());
        let mut next = 0u32;
        for member in members {
            if member.ratio == 0 {
                tracing::warn!(nif = %member.name, "Interface has ratio 0, it receives no traffic");
                continue;
            }
            let end = next.checked_add(member.ratio).ok_or_else(overflow)?;
            arms.push(DispatchArm {
                first: next,
                last: end - 1,
                target: member.target.clone(),
            });
            next = end;
        }

        Ok(Self {
            fields: FLOW_HASH_FIELDS.to_vec(),
            modulus,
            arms,
        })
    }

    fn to_schema(&self) -> stmt::Statement<'static> {
        let concat = self.fields.iter().map(|f| f.expression()).collect();
        let key = expr::Expression::Named(expr::NamedExpression::JHash(expr::JHash {
            hash_mod: self.modulus,
            offset: None,
            expr: Box::new(expr::Expression::Named(expr::NamedExpression::Concat(concat))),
            seed: None,
        }));

        let arms = self
            .arms
            .iter()
            .map(|arm| {
                expr::SetItem::Mapping(
                    expr::Expression::Range(Box::new(expr::Range {
                        range: [expr::Expression::Number(arm.first), expr::Expression::Number(arm.last)],
                    })),
                    expr::Expression::Verdict(expr::Verdict::Goto(stmt::JumpTarget {
                        target: Cow::Owned(arm.target.clone()),
                    })),
                )
            })
            .collect();

        stmt::Statement::VerdictMap(stmt::VerdictMap {
            key,
            data: expr::Expression::Named(expr::NamedExpression::Set(arms)),
        })
    }
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(HashField::as_str).collect();
        let arms: Vec<String> = self
            .arms
            .iter()
            .map(|a| format!("{}-{} : goto {}", a.first, a.last, a.target))
            .collect();
        write!(
            f,
            "jhash {} mod {} vmap {{ {} }}",
            fields.join(" . "),
            self.modulus,
            arms.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Dispatch(Dispatch),
    SetMark(u32),
    Counter,
    Return,
}

impl Statement {
    fn to_schema(&self) -> stmt::Statement<'static> {
        match self {
            Statement::Dispatch(dispatch) => dispatch.to_schema(),
            Statement::SetMark(mark) => stmt::Statement::Mangle(stmt::Mangle {
                key: meta(expr::MetaKey::Mark),
                value: expr::Expression::Number(*mark),
            }),
            Statement::Counter => stmt::Statement::Counter(stmt::Counter::Anonymous(None)),
            Statement::Return => stmt::Statement::Return(None),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Dispatch(dispatch) => write!(f, "{}", dispatch),
            Statement::SetMark(mark) => write!(f, "meta mark set {}", mark),
            Statement::Counter => f.write_str("counter"),
            Statement::Return => f.write_str("return"),
        }
    }
}

/// A rule appended to a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub location: ChainRef,
    pub statements: Vec<Statement>,
}

impl Rule {
    /// The weighted distribution rule for `policy` over `members`.
    pub fn distribution(location: ChainRef, policy: &str, members: &[&Interface]) -> Result<Self, PolicyError> {
        let dispatch = Dispatch::weighted(policy, members)?;
        Ok(Self {
            location,
            statements: vec![Statement::Dispatch(dispatch)],
        })
    }

    /// `meta mark set <mark> [counter] return`
    pub fn mark(location: ChainRef, mark: u32, counter: bool) -> Self {
        let mut statements = vec![Statement::SetMark(mark)];
        if counter {
            statements.push(Statement::Counter);
        }
        statements.push(Statement::Return);
        Self { location, statements }
    }

    /// The rule as an `nftables` schema object.
    pub fn to_schema(&self) -> schema::Rule<'static> {
        schema::Rule {
            family: nf_family(self.location.family),
            table: Cow::Owned(self.location.table.clone()),
            chain: Cow::Owned(self.location.chain.clone()),
            expr: Cow::Owned(self.statements.iter().map(Statement::to_schema).collect()),
            ..Default::default()
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "add rule {}", self.location)?;
        for statement in &self.statements {
            write!(f, " {}", statement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn iface(name: &str, ratio: u32) -> Interface {
        Interface {
            name: name.into(),
            address: "10.8.0.2/24".into(),
            ratio,
            target: name.into(),
            mark: None,
            counter: false,
            checks: Vec::new(),
        }
    }

    fn location() -> ChainRef {
        ChainRef {
            family: TableFamily::Inet,
            table: "vps".into(),
            chain: "lb".into(),
        }
    }

    #[test]
    fn test_weighted_ranges() {
        let (a, b) = (iface("a", 3), iface("b", 7));
        let rule = Rule::distribution(location(), "all", &[&a, &b]).unwrap();
        assert_eq!(
            rule.to_string(),
            "add rule inet vps lb jhash ip saddr . ether saddr . meta l4proto . th sport mod 10 vmap { 0-2 : goto a, 3-9 : goto b }"
        );
    }

    #[test]
    fn test_equal_ratios() {
        let members = [iface("a", 1), iface("b", 1), iface("c", 1)];
        let refs: Vec<&Interface> = members.iter().collect();
        let dispatch = Dispatch::weighted("all", &refs).unwrap();
        assert_eq!(dispatch.modulus, 3);
        let ranges: Vec<(u32, u32)> = dispatch.arms.iter().map(|a| (a.first, a.last)).collect();
        assert_eq!(ranges, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_zero_sum_rejected() {
        let (a, b) = (iface("a", 0), iface("b", 0));
        assert_eq!(
            Dispatch::weighted("a|b", &[&a, &b]),
            Err(PolicyError::ZeroRatioSum { policy: "a|b".into() })
        );
        assert_eq!(Dispatch::weighted("none", &[]), Err(PolicyError::Empty("none".into())));
    }

    #[test]
    fn test_ratio_overflow_rejected() {
        let (a, b) = (iface("a", u32::MAX), iface("b", 1));
        assert_eq!(
            Dispatch::weighted("all", &[&a, &b]),
            Err(PolicyError::RatioOverflow { policy: "all".into() })
        );

        let (a, b) = (iface("a", u32::MAX - 1), iface("b", 1));
        let dispatch = Dispatch::weighted("all", &[&a, &b]).unwrap();
        assert_eq!(dispatch.modulus, u32::MAX);
        assert_eq!(dispatch.arms[1].first, u32::MAX - 1);
        assert_eq!(dispatch.arms[1].last, u32::MAX - 1);
    }

    #[test]
    fn test_zero_ratio_member_gets_no_range() {
        let (a, b, c) = (iface("a", 2), iface("b", 0), iface("c", 1));
        let dispatch = Dispatch::weighted("all", &[&a, &b, &c]).unwrap();
        assert_eq!(dispatch.to_string().split("vmap").nth(1).unwrap(), " { 0-1 : goto a, 2-2 : goto c }");
    }

    #[test]
    fn test_mark_rule_text() {
        let loc = ChainRef {
            chain: "to_wg0".into(),
            ..location()
        };
        assert_eq!(
            Rule::mark(loc.clone(), 16, false).to_string(),
            "add rule inet vps to_wg0 meta mark set 16 return"
        );
        assert_eq!(
            Rule::mark(loc, 16, true).to_string(),
            "add rule inet vps to_wg0 meta mark set 16 counter return"
        );
    }

    #[test]
    fn test_schema_shape() {
        let (a, b) = (iface("a", 1), iface("b", 2));
        let rule = Rule::distribution(location(), "all", &[&a, &b]).unwrap();
        let value = serde_json::to_value(rule.to_schema()).unwrap();
        assert_eq!(value["family"], "inet");
        assert_eq!(value["chain"], "lb");
        let vmap = &value["expr"][0]["vmap"];
        assert_eq!(vmap["key"]["jhash"]["mod"], 3);
        assert_eq!(vmap["key"]["jhash"]["expr"]["concat"].as_array().unwrap().len(), 4);
        assert_eq!(vmap["data"]["set"][1][0]["range"], json!([1, 2]));
        assert_eq!(vmap["data"]["set"][1][1]["goto"]["target"], "b");

        let mark = serde_json::to_value(Rule::mark(location(), 7, true).to_schema()).unwrap();
        assert_eq!(mark["expr"][0]["mangle"]["key"], json!({"meta": {"key": "mark"}}));
        assert_eq!(mark["expr"][0]["mangle"]["value"], 7);
        assert_eq!(mark["expr"][2], json!({"return": null}));
    }
}
