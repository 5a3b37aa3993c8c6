//! Based on a set of rules, validate a token stream and collect the
//! tokens by type.
//!
//! See [`SectionRules`] for more information.

use crate::parse::keyword::Keyword;
use crate::parse::tokenize::Item;
use crate::{NetdocErrorKind as EK, Result};

use std::ops::{Bound, RangeBounds};

/// May an Item take an object?
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ObjKind {
    /// No object is allowed.
    NoObj,
    /// An object is required.
    ObjRequired,
    /// An object is optional.
    ObjOk,
}

/// A set of restrictions to apply to a single keyword.
#[derive(Clone, Debug)]
struct TokenFmt<K: Keyword> {
    /// Which keyword is being restricted?
    kwd: K,
    /// If present, a lower bound on how many arguments may be present.
    min_args: Option<usize>,
    /// If present, an upper bound on how many arguments may be present.
    max_args: Option<usize>,
    /// If true, then at least one of this token must appear.
    required: bool,
    /// If false, then no more than one this token may appear.
    may_repeat: bool,
    /// May this token have an object?  Must it?
    obj: ObjKind,
}

impl<K: Keyword> TokenFmt<K> {
    /// Check whether a single Item matches this TokenFmt, with respect to
    /// its number of arguments and its object presence.
    fn check_item(&self, item: &Item<'_, K>) -> Result<()> {
        if let Some(max_args) = self.max_args {
            if item.n_args() > max_args {
                return Err(EK::TooManyArguments
                    .with_msg(self.kwd.to_str())
                    .at_pos(item.pos()));
            }
        }
        if let Some(min_args) = self.min_args {
            if item.n_args() < min_args {
                return Err(EK::TooFewArguments
                    .with_msg(self.kwd.to_str())
                    .at_pos(item.pos()));
            }
        }
        match (self.obj, item.has_obj()) {
            (ObjKind::NoObj, true) => Err(EK::UnexpectedObject
                .with_msg(self.kwd.to_str())
                .at_pos(item.pos())),
            (ObjKind::ObjRequired, false) => Err(EK::MissingObject
                .with_msg(self.kwd.to_str())
                .at_pos(item.pos())),
            (_, _) => Ok(()),
        }
    }
}

/// Represents a TokenFmt under construction.
///
/// To construct a rule, create this type with Keyword::rule(), then use
/// method chaining to set its fields, and then pass it to
/// SectionRulesBuilder::add().
#[derive(Clone)]
pub(crate) struct TokenFmtBuilder<K: Keyword>(TokenFmt<K>);

impl<K: Keyword> From<TokenFmtBuilder<K>> for TokenFmt<K> {
    fn from(builder: TokenFmtBuilder<K>) -> Self {
        builder.0
    }
}

impl<K: Keyword> TokenFmtBuilder<K> {
    /// Make a new TokenFmtBuilder with default behavior.
    ///
    /// (By default, all arguments are allowed, the Item may appear 0
    /// or 1 times, and it may not take an object.)
    fn new(t: K) -> Self {
        Self(TokenFmt {
            kwd: t,
            min_args: None,
            max_args: None,
            required: false,
            may_repeat: false,
            obj: ObjKind::NoObj,
        })
    }

    /// Indicate that this Item is required.
    ///
    /// By default, no item is required.
    pub(crate) fn required(self) -> Self {
        Self(TokenFmt {
            required: true,
            ..self.0
        })
    }

    /// Indicate that this Item may appear more than once.
    ///
    /// By default, items may not repeat.
    pub(crate) fn may_repeat(self) -> Self {
        Self(TokenFmt {
            may_repeat: true,
            ..self.0
        })
    }

    /// Indicate that this Item takes a certain number of arguments.
    ///
    /// By default, items may take any number of arguments.
    pub(crate) fn args<R: RangeBounds<usize>>(self, r: R) -> Self {
        let min_args = match r.start_bound() {
            Bound::Included(x) => Some(*x),
            Bound::Excluded(x) => Some(*x + 1),
            Bound::Unbounded => None,
        };
        let max_args = match r.end_bound() {
            Bound::Included(x) => Some(*x),
            Bound::Excluded(x) => Some(*x - 1),
            Bound::Unbounded => None,
        };
        Self(TokenFmt {
            min_args,
            max_args,
            ..self.0
        })
    }

    /// Indicate that this Item must take an object.
    ///
    /// By default, items may not have objects.
    pub(crate) fn obj_required(self) -> Self {
        Self(TokenFmt {
            obj: ObjKind::ObjRequired,
            ..self.0
        })
    }

    /// Indicate that this Item may take an object.
    ///
    /// By default, items may not have objects.
    pub(crate) fn obj_optional(self) -> Self {
        Self(TokenFmt {
            obj: ObjKind::ObjOk,
            ..self.0
        })
    }
}

/// Extension trait to make a TokenFmtBuilder from a Keyword.
pub(crate) trait KeywordRule: Keyword {
    /// Return a TokenFmtBuilder for this keyword.
    fn rule(self) -> TokenFmtBuilder<Self>;
}

impl<K: Keyword> KeywordRule for K {
    fn rule(self) -> TokenFmtBuilder<Self> {
        TokenFmtBuilder::new(self)
    }
}

/// A builder for a set of section rules.
#[derive(Clone)]
pub(crate) struct SectionRulesBuilder<K: Keyword> {
    /// The rules we're building.
    rules: Vec<Option<TokenFmt<K>>>,
}

impl<K: Keyword> SectionRulesBuilder<K> {
    /// Add a rule to this SectionRulesBuilder, based on a
    /// TokenFmtBuilder.
    ///
    /// Requires that no rule yet exists for the provided keyword.
    pub(crate) fn add(&mut self, t: TokenFmtBuilder<K>) {
        let rule: TokenFmt<_> = t.into();
        let idx = rule.kwd.idx();
        assert!(self.rules[idx].is_none());
        self.rules[idx] = Some(rule);
    }

    /// Construct the SectionRules from this builder.
    pub(crate) fn build(self) -> SectionRules<K> {
        SectionRules { rules: self.rules }
    }
}

/// A set of rules for decoding one section of a document.
///
/// Each type of document or part of a document has its own rules: they
/// specify which keywords are recognized there, which are required, which
/// may repeat, how many arguments each takes, and whether each takes an
/// object.  Any unrecognized keyword encountered while parsing with a
/// SectionRules is an error: this document family does not allow unknown
/// items to be skipped.
pub(crate) struct SectionRules<K: Keyword> {
    /// A set of rules for decoding a section of a document, indexed by
    /// keyword index.
    rules: Vec<Option<TokenFmt<K>>>,
}

impl<K: Keyword> SectionRules<K> {
    /// Create a new builder with no rules.
    pub(crate) fn builder() -> SectionRulesBuilder<K> {
        let n = K::n_vals();
        let mut rules = Vec::with_capacity(n);
        rules.resize(n, None);
        SectionRulesBuilder { rules }
    }

    /// Parse a stream of tokens into a Section, checking each token
    /// against these rules as it arrives.
    pub(crate) fn parse<'a, I>(&self, tokens: I) -> Result<Section<'a, K>>
    where
        I: Iterator<Item = Result<Item<'a, K>>>,
    {
        let mut section = Section::new();
        for item in tokens {
            let item = item?;
            let idx = item.kwd().idx();
            match &self.rules[idx] {
                None => {
                    return Err(EK::UnexpectedToken
                        .with_msg(item.kwd_str().to_string())
                        .at_pos(item.pos()));
                }
                Some(rule) => {
                    if !rule.may_repeat && !section.v[idx].is_empty() {
                        return Err(EK::DuplicateToken
                            .with_msg(item.kwd().to_str())
                            .at_pos(item.pos()));
                    }
                    rule.check_item(&item)?;
                    section.add(item);
                }
            }
        }

        // Check that every required keyword was present.
        for rule in self.rules.iter().flatten() {
            if rule.required && section.v[rule.kwd.idx()].is_empty() {
                return Err(EK::MissingToken.with_msg(rule.kwd.to_str()));
            }
        }

        Ok(section)
    }
}

/// The tokens of one section of a document, grouped by keyword.
#[derive(Debug)]
pub(crate) struct Section<'a, K: Keyword> {
    /// Tokens for each keyword, indexed by Keyword::idx().
    v: Vec<Vec<Item<'a, K>>>,
    /// All the tokens, in the order they appeared.
    items: Vec<Item<'a, K>>,
}

impl<'a, K: Keyword> Section<'a, K> {
    /// Create a new empty Section.
    fn new() -> Self {
        let n = K::n_vals();
        let mut v = Vec::with_capacity(n);
        v.resize(n, Vec::new());
        Section {
            v,
            items: Vec::new(),
        }
    }

    /// Add an item to this section.
    fn add(&mut self, item: Item<'a, K>) {
        self.v[item.kwd().idx()].push(item.clone());
        self.items.push(item);
    }

    /// Return all the items in this section, in the order they appeared.
    pub(crate) fn items(&self) -> &[Item<'a, K>] {
        &self.items[..]
    }

    /// Return the first item in this section, in document order.
    pub(crate) fn first_item(&self) -> Option<&Item<'a, K>> {
        self.items.first()
    }

    /// Return the last item in this section, in document order.
    pub(crate) fn last_item(&self) -> Option<&Item<'a, K>> {
        self.items.last()
    }

    /// Return the only token of type `t`, if any.
    pub(crate) fn get(&self, t: K) -> Option<&Item<'a, K>> {
        self.v[t.idx()].first()
    }

    /// Return the only token of type `t`, or an error if it is missing.
    pub(crate) fn required(&self, t: K) -> Result<&Item<'a, K>> {
        self.get(t)
            .ok_or_else(|| EK::MissingToken.with_msg(t.to_str()))
    }

    /// Return all the tokens of type `t`, in document order.
    #[allow(unused)]
    pub(crate) fn slice(&self, t: K) -> &[Item<'a, K>] {
        &self.v[t.idx()][..]
    }

    /// Check that the keywords of this section's items are exactly the
    /// sequence `kwds`, in order.
    ///
    /// (Some documents fix not just the multiplicity but the exact
    /// position of each entry.)
    pub(crate) fn check_exact_sequence(&self, kwds: &[K]) -> Result<()> {
        if self.items.len() != kwds.len()
            || self.items.iter().zip(kwds).any(|(item, k)| item.kwd() != *k)
        {
            for (item, k) in self.items.iter().zip(kwds) {
                if item.kwd() != *k {
                    return Err(EK::MisplacedToken
                        .with_msg(item.kwd_str().to_string())
                        .at_pos(item.pos()));
                }
            }
            return Err(EK::MissingToken.with_msg("entries missing or out of sequence"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::parse::keyword::test::Fruit;
    use crate::parse::tokenize::NetDocReader;
    use once_cell::sync::Lazy;

    /// Rules for parsing a set of router annotations.
    static FRUIT_SALAD: Lazy<SectionRules<Fruit>> = Lazy::new(|| {
        use Fruit::*;
        let mut rules = SectionRules::builder();
        rules.add(APPLE.rule().args(1..));
        rules.add(ORANGE.rule().args(1..));
        rules.add(STONEFRUIT.rule().may_repeat());
        rules.add(PLUM.rule().may_repeat().args(1..));
        rules.add(GUAVA.rule().obj_optional());
        rules.add(LEMON.rule().required().obj_required());
        rules.build()
    });

    #[test]
    fn parse_section() {
        use Fruit::*;
        let s = "\
apple 77
orange 60
cherry 1
plum 2
cherry 3
guava
lemon
-----BEGIN LEMON-----
8J+Ni/CfjYs=
-----END LEMON-----
";
        let r: NetDocReader<'_, Fruit> = NetDocReader::new(s);
        let sec = FRUIT_SALAD.parse(r).unwrap();

        assert_eq!(sec.first_item().unwrap().kwd(), APPLE);
        assert_eq!(sec.last_item().unwrap().kwd(), LEMON);
        assert_eq!(sec.required(APPLE).unwrap().arg(0), Some("77"));
        assert_eq!(sec.slice(STONEFRUIT).len(), 2);
        assert_eq!(sec.slice(PLUM).len(), 1);
        assert_eq!(sec.get(GUAVA).unwrap().n_args(), 0);
        assert_eq!(sec.required(LEMON).unwrap().obj("LEMON").unwrap().len(), 8);
        assert_eq!(sec.items().len(), 7);
    }

    #[test]
    fn rejects() {
        use Fruit::*;

        fn parse(s: &str) -> Result<Section<'_, Fruit>> {
            let r: NetDocReader<'_, Fruit> = NetDocReader::new(s);
            FRUIT_SALAD.parse(r)
        }

        // unrecognized keyword
        let e = parse("coconut\n").unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::UnexpectedToken);

        // duplicate of a non-repeatable keyword
        let e = parse("apple 1\napple 2\nlemon\n-----BEGIN LEMON-----\nAA==\n-----END LEMON-----\n")
            .unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::DuplicateToken);

        // missing required keyword
        let e = parse("apple 1\n").unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::MissingToken);

        // too few arguments
        let e = parse("apple\nlemon\n-----BEGIN LEMON-----\nAA==\n-----END LEMON-----\n")
            .unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::TooFewArguments);

        // unexpected object
        let e = parse(
            "apple 1\n-----BEGIN APPLE-----\nAA==\n-----END APPLE-----\nlemon\n-----BEGIN LEMON-----\nAA==\n-----END LEMON-----\n",
        )
        .unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::UnexpectedObject);

        // missing object
        let e = parse("lemon\n").unwrap_err();
        assert_eq!(e.netdoc_error_kind(), EK::MissingObject);
    }

    #[test]
    fn exact_sequence() {
        use Fruit::*;
        let s = "apple 1\norange 2\nlemon\n-----BEGIN LEMON-----\nAA==\n-----END LEMON-----\n";
        let r: NetDocReader<'_, Fruit> = NetDocReader::new(s);
        let sec = FRUIT_SALAD.parse(r).unwrap();
        assert!(sec.check_exact_sequence(&[APPLE, ORANGE, LEMON]).is_ok());
        assert!(sec.check_exact_sequence(&[ORANGE, APPLE, LEMON]).is_err());
        assert!(sec.check_exact_sequence(&[APPLE, ORANGE]).is_err());
    }
}
