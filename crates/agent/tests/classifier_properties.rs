//! Property-style tests for the keyword classifier over the built-in registry
//!
//! These walk every registered keyword rather than hand-picked samples.

use std::sync::Arc;

use helpdesk_agent::Classifier;
use helpdesk_config::{builtin_registry, CompanyProfile};
use helpdesk_core::IntentTag;

fn classifier() -> Classifier {
    Classifier::new(Arc::new(builtin_registry().unwrap()))
}

/// Position of an intent's rule within a profile
fn position(profile: &CompanyProfile, intent: IntentTag) -> usize {
    profile
        .rules()
        .iter()
        .position(|r| r.intent == intent)
        .unwrap()
}

/// Every keyword classifies to its own rule unless an earlier-declared rule
/// has a keyword contained in it
#[test]
fn test_keywords_classify_to_first_containing_rule() {
    let c = classifier();
    for profile in c.registry().iter() {
        for rule in profile.keyword_rules() {
            for keyword in &rule.keywords {
                let detected = c.detect_intent(keyword, &profile.id);
                let expected = profile
                    .keyword_rules()
                    .find(|r| r.keywords.iter().any(|k| keyword.contains(k.as_str())))
                    .map(|r| r.intent)
                    .unwrap();
                assert_eq!(detected, expected, "{}: '{}'", profile.id, keyword);
                assert!(
                    position(profile, detected) <= position(profile, rule.intent),
                    "{}: '{}' resolved to a later rule",
                    profile.id,
                    keyword
                );
            }
        }
    }
}

#[test]
fn test_unshadowed_keywords_classify_to_own_intent() {
    let c = classifier();
    let mut checked = 0;
    for profile in c.registry().iter() {
        for rule in profile.keyword_rules() {
            for keyword in &rule.keywords {
                let shadowed = profile
                    .keyword_rules()
                    .take_while(|r| r.intent != rule.intent)
                    .any(|r| r.keywords.iter().any(|k| keyword.contains(k.as_str())));
                if !shadowed {
                    assert_eq!(c.detect_intent(keyword, &profile.id), rule.intent);
                    checked += 1;
                }
            }
        }
    }
    assert!(checked > 50);
}

#[test]
fn test_matching_ignores_case() {
    let c = classifier();
    for profile in c.registry().iter() {
        for rule in profile.keyword_rules() {
            for keyword in &rule.keywords {
                assert_eq!(
                    c.detect_intent(&keyword.to_uppercase(), &profile.id),
                    c.detect_intent(keyword, &profile.id)
                );
            }
        }
    }
}

#[test]
fn test_messages_without_keywords_are_general() {
    let c = classifier();
    let messages = [
        "",
        "Hello, what are your hours?",
        "Where are you located?",
        "thanks, bye",
    ];
    for profile in c.registry().iter() {
        for message in messages {
            assert_eq!(c.detect_intent(message, &profile.id), IntentTag::General);
        }
    }
}

#[test]
fn test_resolve_company_is_total() {
    let c = classifier();
    let inputs: [(Option<&str>, &str); 5] = [
        (None, ""),
        (Some(""), "nothing here"),
        (Some("HONDA"), "???"),
        (Some("unknown"), "my toyota"),
        (Some("toyota"), "honda"),
    ];
    for (id, message) in inputs {
        let profile = c.resolve_company(id, message);
        assert!(c.registry().get(&profile.id).is_some());
    }
}

#[test]
fn test_repeated_calls_are_identical() {
    let c = classifier();
    let message = "I want to buy a Toyota but the engine is making noise";
    let first = c.classify(message, None);
    for _ in 0..10 {
        assert_eq!(c.classify(message, None), first);
    }
}

#[test]
fn test_concurrent_classification() {
    let c = classifier();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let c = c.clone();
            std::thread::spawn(move || {
                let message = if i % 2 == 0 { "brake noise" } else { "insurance claim" };
                c.detect_intent(message, "honda")
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let expected = if i % 2 == 0 { IntentTag::Service } else { IntentTag::Insurance };
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_literal_scenarios() {
    let c = classifier();
    assert_eq!(c.detect_intent("What's the price for a new Civic?", "honda"), IntentTag::Sales);
    assert_eq!(c.detect_intent("My brake is making noise", "honda"), IntentTag::Service);
    assert_eq!(c.detect_intent("I want to file an insurance claim", "honda"), IntentTag::Insurance);
    assert_eq!(c.detect_intent("Hello, what are your hours?", "honda"), IntentTag::General);
    assert_eq!(c.detect_company("I love my Toyota Camry"), "toyota");
    assert_eq!(c.routing_key(IntentTag::Service, "honda"), "Service_Conversations");
}
