use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Role a connection declared once at join time.
///
/// Self-declared and unauthenticated by design; privileged events re-derive
/// it from the registry, never from client-supplied payload fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs polls, sees the roster.
    Teacher,
    /// Votes, at most once per poll.
    Student,
}

/// Handle used to push messages to a connected client.
#[derive(Clone)]
pub struct ClientConnection {
    /// Session id declared at join; `"teacher"` for teacher connections.
    pub session_id: String,
    /// Display name.
    pub name: String,
    /// Declared role, fixed for the connection's lifetime.
    pub role: Role,
    /// Outbound channel feeding the connection's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Process-local registry of live connections keyed by connection id.
///
/// A connection appears here only after its join event and is removed on
/// disconnect or kick. Lifetime is tied to the server process.
#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<Uuid, ClientConnection>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a connection after its join event.
    pub fn insert(&self, connection_id: Uuid, connection: ClientConnection) {
        self.connections.insert(connection_id, connection);
    }

    /// Drop a connection, returning its entry when it was registered.
    pub fn remove(&self, connection_id: &Uuid) -> Option<ClientConnection> {
        self.connections
            .remove(connection_id)
            .map(|(_, connection)| connection)
    }

    /// Current entry for a connection, if it has joined.
    pub fn get(&self, connection_id: &Uuid) -> Option<ClientConnection> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Declared role of a connection.
    pub fn role_of(&self, connection_id: &Uuid) -> Option<Role> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().role)
    }

    /// Number of connected students.
    pub fn student_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().role == Role::Student)
            .count()
    }

    /// Display names of connected students.
    pub fn student_names(&self) -> Vec<String> {
        self.connections
            .iter()
            .filter(|entry| entry.value().role == Role::Student)
            .map(|entry| entry.value().name.clone())
            .collect()
    }

    /// Outbound channels of all teacher connections.
    pub fn teacher_senders(&self) -> Vec<mpsc::UnboundedSender<Message>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().role == Role::Teacher)
            .map(|entry| entry.value().tx.clone())
            .collect()
    }

    /// Outbound channels of every joined connection.
    pub fn all_senders(&self) -> Vec<mpsc::UnboundedSender<Message>> {
        self.connections
            .iter()
            .map(|entry| entry.value().tx.clone())
            .collect()
    }

    /// Locate a student connection by session id, falling back to
    /// display-name equality. The fallback exists because the teacher UI
    /// only holds display names for its kick action.
    pub fn find_student(&self, target: &str) -> Option<(Uuid, ClientConnection)> {
        let by_session = self.connections.iter().find(|entry| {
            entry.value().role == Role::Student && entry.value().session_id == target
        });
        if let Some(entry) = by_session {
            return Some((*entry.key(), entry.value().clone()));
        }

        self.connections
            .iter()
            .find(|entry| entry.value().role == Role::Student && entry.value().name == target)
            .map(|entry| (*entry.key(), entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(session_id: &str, name: &str, role: Role) -> ClientConnection {
        let (tx, _rx) = mpsc::unbounded_channel();
        ClientConnection {
            session_id: session_id.into(),
            name: name.into(),
            role,
            tx,
        }
    }

    #[test]
    fn counts_and_names_cover_students_only() {
        let registry = SessionRegistry::new();
        registry.insert(Uuid::new_v4(), connection("teacher", "Teacher", Role::Teacher));
        registry.insert(Uuid::new_v4(), connection("s1", "Ada", Role::Student));
        registry.insert(Uuid::new_v4(), connection("s2", "Grace", Role::Student));

        assert_eq!(registry.student_count(), 2);
        let mut names = registry.student_names();
        names.sort();
        assert_eq!(names, vec!["Ada".to_string(), "Grace".to_string()]);
        assert_eq!(registry.teacher_senders().len(), 1);
        assert_eq!(registry.all_senders().len(), 3);
    }

    #[test]
    fn find_student_prefers_session_id_over_name() {
        let registry = SessionRegistry::new();
        let by_name = Uuid::new_v4();
        let by_session = Uuid::new_v4();
        // One student whose display name collides with another's session id.
        registry.insert(by_name, connection("s1", "s2", Role::Student));
        registry.insert(by_session, connection("s2", "Grace", Role::Student));

        let (found, _) = registry.find_student("s2").unwrap();
        assert_eq!(found, by_session);
    }

    #[test]
    fn find_student_falls_back_to_name() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, connection("s1", "Ada", Role::Student));

        let (found, _) = registry.find_student("Ada").unwrap();
        assert_eq!(found, id);
        assert!(registry.find_student("nobody").is_none());
    }

    #[test]
    fn teachers_are_never_kick_targets() {
        let registry = SessionRegistry::new();
        registry.insert(Uuid::new_v4(), connection("teacher", "Teacher", Role::Teacher));
        assert!(registry.find_student("teacher").is_none());
        assert!(registry.find_student("Teacher").is_none());
    }

    #[test]
    fn remove_returns_the_entry() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, connection("s1", "Ada", Role::Student));

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.name, "Ada");
        assert!(registry.remove(&id).is_none());
        assert_eq!(registry.student_count(), 0);
    }
}
