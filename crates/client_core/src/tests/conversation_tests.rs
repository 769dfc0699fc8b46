use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::domain::TurnRole;

struct ScriptedService {
    reply: Result<String, fn() -> ServiceError>,
    calls: Arc<AtomicUsize>,
    credentials: bool,
}

impl ScriptedService {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
            credentials: true,
        }
    }

    fn failing(err: fn() -> ServiceError) -> Self {
        Self {
            reply: Err(err),
            calls: Arc::new(AtomicUsize::new(0)),
            credentials: true,
        }
    }

    fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextCompletionService for ScriptedService {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }
}

#[test]
fn starts_with_greeting_and_idle() {
    let conversation = Conversation::default();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.transcript()[0].role, TurnRole::Assistant);
    assert_eq!(conversation.transcript()[0].text, DEFAULT_GREETING);
    assert_eq!(conversation.state(), ConversationState::Idle);
    assert!(!conversation.can_submit());
    assert_eq!(conversation.scroll_anchor(), Some(0));
}

#[test]
fn submission_is_observable_as_sending_before_the_reply() {
    let mut conversation = Conversation::default();
    conversation.set_input("What is optimal protocol?");
    assert!(conversation.can_submit());

    let request = conversation.submit().expect("accepted");
    assert_eq!(request.prompt, "What is optimal protocol?");
    assert!(conversation.is_sending());
    assert!(conversation.input().is_empty());
    assert_eq!(conversation.len(), 2);
    let question = ConversationTurn::user("What is optimal protocol?");
    assert_eq!(conversation.transcript()[1], question);
    assert!(!conversation.can_submit());

    let settled = conversation.resolve(request.ticket, Ok("Sleep first.".to_string()));
    assert_eq!(settled, Settled::Succeeded);
    assert_eq!(conversation.state(), ConversationState::Idle);
    assert_eq!(conversation.len(), 3);
    let reply = ConversationTurn::assistant("Sleep first.");
    assert_eq!(conversation.transcript()[2], reply);
    assert_eq!(conversation.scroll_anchor(), Some(2));
}

#[test]
fn whitespace_input_is_rejected_without_mutation() {
    let mut conversation = Conversation::default();
    conversation.set_input("   \n\t");
    assert!(!conversation.can_submit());
    assert_eq!(conversation.submit(), Err(SubmitRejected::EmptyInput));
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[test]
fn second_submission_is_rejected_while_sending() {
    let mut conversation = Conversation::default();
    conversation.set_input("first");
    let first = conversation.submit().expect("first");

    conversation.set_input("second");
    assert_eq!(conversation.submit(), Err(SubmitRejected::AlreadySending));
    assert_eq!(conversation.input(), "second");
    assert_eq!(conversation.len(), 2);
    let sending = ConversationState::Sending { ticket: first.ticket };
    assert_eq!(conversation.state(), sending);
}

#[test]
fn failure_appends_fallback_and_keeps_user_turn() {
    let mut conversation = Conversation::default();
    conversation.set_input("hello");
    let request = conversation.submit().expect("accepted");

    let settled = conversation.resolve(
        request.ticket,
        Err(ServiceError::Unavailable("connection reset".to_string())),
    );
    assert_eq!(settled, Settled::Failed(FailureKind::Transport));
    assert_eq!(conversation.len(), 3);
    let question = ConversationTurn::user("hello");
    assert_eq!(conversation.transcript()[1], question);
    assert_eq!(
        conversation.transcript()[2],
        ConversationTurn::assistant(CONVERSATION_FALLBACK_REPLY)
    );
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[test]
fn blank_reply_counts_as_malformed() {
    let mut conversation = Conversation::default();
    conversation.set_input("hello");
    let request = conversation.submit().expect("accepted");

    let settled = conversation.resolve(request.ticket, Ok("  ".to_string()));
    assert_eq!(settled, Settled::Failed(FailureKind::MalformedResponse));
    let reply = &conversation.transcript()[2].text;
    assert_eq!(reply, CONVERSATION_FALLBACK_REPLY);
}

#[test]
fn abandoned_ticket_reply_is_discarded() {
    let mut conversation = Conversation::default();
    conversation.set_input("hello");
    let request = conversation.submit().expect("accepted");

    assert_eq!(conversation.abandon(), Some(request.ticket));
    assert_eq!(conversation.abandon(), None);

    let settled = conversation.resolve(request.ticket, Ok("late".to_string()));
    assert_eq!(settled, Settled::Discarded);
    assert_eq!(conversation.len(), 2);

    conversation.set_input("again");
    let next = conversation.submit().expect("accepted after abandon");
    assert_ne!(next.ticket, request.ticket);
    let stale = conversation.resolve(request.ticket, Ok("stale".to_string()));
    assert_eq!(stale, Settled::Discarded);
    assert!(conversation.is_sending());
}

#[tokio::test]
async fn send_issues_exactly_one_request() {
    let service = ScriptedService::replying("Consistency beats intensity.");
    let mut conversation = Conversation::default();
    conversation.set_input("What is optimal protocol?");

    let settled = conversation.send(&service).await.expect("accepted");
    assert_eq!(settled, Settled::Succeeded);
    assert_eq!(service.calls(), 1);
    assert_eq!(conversation.len(), 3);
    let reply = &conversation.transcript()[2].text;
    assert_eq!(reply, "Consistency beats intensity.");
}

#[tokio::test]
async fn send_with_empty_input_issues_no_request() {
    let service = ScriptedService::replying("unused");
    let mut conversation = Conversation::default();
    conversation.set_input(" ");

    let rejected = conversation.send(&service).await;
    assert_eq!(rejected, Err(SubmitRejected::EmptyInput));
    assert_eq!(service.calls(), 0);
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn missing_credentials_short_circuit_to_fallback() {
    let service = ScriptedService::replying("unused").without_credentials();
    let mut conversation = Conversation::default();
    conversation.set_input("hello");

    let settled = conversation.send(&service).await.expect("accepted");
    assert_eq!(settled, Settled::Failed(FailureKind::Configuration));
    assert_eq!(service.calls(), 0);
    let reply = &conversation.transcript()[2].text;
    assert_eq!(reply, CONVERSATION_FALLBACK_REPLY);
}

#[tokio::test]
async fn service_failure_through_send_appends_fallback() {
    let service = ScriptedService::failing(|| ServiceError::NoImage);
    let mut conversation = Conversation::default();
    conversation.set_input("hello");

    let settled = conversation.send(&service).await.expect("accepted");
    assert_eq!(settled, Settled::Failed(FailureKind::MalformedResponse));
    assert_eq!(service.calls(), 1);
    assert!(!conversation.is_sending());
}
