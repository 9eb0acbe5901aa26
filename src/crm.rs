// Deal pipeline, task list and channel list shown next to the client roster.
// The bridge has no endpoints for these yet, so the workspace starts from a
// built-in sample set.

use std::fmt;

use crate::models::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DealStage {
    NewLead,
    Negotiation,
    Approval,
    Payment,
}

impl DealStage {
    pub const ALL: [DealStage; 4] = [
        DealStage::NewLead,
        DealStage::Negotiation,
        DealStage::Approval,
        DealStage::Payment,
    ];
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DealStage::NewLead => "New lead",
            DealStage::Negotiation => "Negotiation",
            DealStage::Approval => "Approval",
            DealStage::Payment => "Payment",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub id: u32,
    pub client: String,
    pub amount: u64, // rubles
    pub stage: DealStage,
    pub probability: u8, // percent
    pub channel: String,
}

impl Deal {
    pub fn weighted_amount(&self) -> u64 {
        self.amount * u64::from(self.probability.min(100)) / 100
    }
}

// Declaration order is sort order: high first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub due: String,
    pub assignee: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Channel,
    Group,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: u32,
    pub name: String,
    pub kind: ChannelKind,
    pub audience: u32, // subscribers for channels, members for groups
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub weighted_total: u64,
    pub per_stage: Vec<(DealStage, usize)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// Result of a search across every entity the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct SearchResults<'a> {
    pub clients: Vec<&'a Client>,
    pub deals: Vec<&'a Deal>,
    pub tasks: Vec<&'a Task>,
    pub channels: Vec<&'a Channel>,
}

impl SearchResults<'_> {
    pub fn total(&self) -> usize {
        self.clients.len() + self.deals.len() + self.tasks.len() + self.channels.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub deals: Vec<Deal>,
    pub tasks: Vec<Task>,
    pub channels: Vec<Channel>,
}

impl Workspace {
    pub fn sample() -> Self {
        let deal = |id, client: &str, amount, stage, probability, channel: &str| Deal {
            id,
            client: client.to_string(),
            amount,
            stage,
            probability,
            channel: channel.to_string(),
        };
        let task = |id, title: &str, priority, due: &str, assignee: &str, status| Task {
            id,
            title: title.to_string(),
            priority,
            due: due.to_string(),
            assignee: assignee.to_string(),
            status,
        };
        let channel = |id, name: &str, kind, audience| Channel {
            id,
            name: name.to_string(),
            kind,
            audience,
            active: true,
        };

        Workspace {
            deals: vec![
                deal(1, "Alexander Ivanov", 150_000, DealStage::Negotiation, 75, "Telegram Premium"),
                deal(2, "Maria Petrova", 85_000, DealStage::NewLead, 30, "Support channel"),
                deal(3, "Dmitry Smirnov", 220_000, DealStage::Approval, 90, "VIP chat"),
                deal(4, "Anna Volkova", 45_000, DealStage::Payment, 95, "Main channel"),
            ],
            tasks: vec![
                task(1, "Call back client Ivanov", Priority::High, "Today, 15:00", "You", TaskStatus::Pending),
                task(2, "Prepare commercial offer", Priority::Medium, "Tomorrow, 12:00", "Manager A.", TaskStatus::InProgress),
                task(3, "Set up channel auto-reply", Priority::Low, "In 3 days", "Tech team", TaskStatus::Pending),
                task(4, "Train new operators", Priority::Medium, "In 2 days", "You", TaskStatus::Completed),
            ],
            channels: vec![
                channel(1, "Main channel", ChannelKind::Channel, 12_450),
                channel(2, "VIP clients", ChannelKind::Group, 127),
                channel(3, "Support 24/7", ChannelKind::Group, 8),
                channel(4, "Company news", ChannelKind::Channel, 8_920),
            ],
        }
    }

    pub fn pipeline(&self) -> PipelineSummary {
        PipelineSummary {
            weighted_total: self.deals.iter().map(Deal::weighted_amount).sum(),
            per_stage: DealStage::ALL
                .iter()
                .map(|stage| (*stage, self.deals.iter().filter(|d| d.stage == *stage).count()))
                .collect(),
        }
    }

    pub fn task_summary(&self) -> TaskSummary {
        let mut summary = TaskSummary::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
            }
        }
        summary
    }

    /// Open tasks, most urgent first. Ties keep list order.
    pub fn open_tasks(&self) -> Vec<&Task> {
        let mut open: Vec<&Task> = self.tasks.iter().filter(|t| t.is_open()).collect();
        open.sort_by_key(|t| t.priority);
        open
    }

    pub fn search<'a>(&'a self, query: &str, clients: &'a [Client]) -> SearchResults<'a> {
        let needle = query.trim().to_lowercase();
        let hit = |fields: &[&str]| {
            needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&needle))
        };

        SearchResults {
            clients: clients
                .iter()
                .filter(|c| hit(&[c.display_name.as_str(), c.handle.as_str()]))
                .collect(),
            deals: self
                .deals
                .iter()
                .filter(|d| hit(&[d.client.as_str(), d.channel.as_str(), d.stage.to_string().as_str()]))
                .collect(),
            tasks: self
                .tasks
                .iter()
                .filter(|t| hit(&[t.title.as_str(), t.assignee.as_str()]))
                .collect(),
            channels: self.channels.iter().filter(|c| hit(&[c.name.as_str()])).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;

    fn client(name: &str, handle: &str) -> Client {
        Client {
            id: 1,
            display_name: name.to_string(),
            handle: handle.to_string(),
            avatar_initial: name.chars().next().unwrap_or('?'),
            conversation_id: None,
            status: ClientStatus::Active,
            tags: Vec::new(),
            last_seen: "recently".to_string(),
        }
    }

    #[test]
    fn test_pipeline_weights_by_probability() {
        let ws = Workspace::sample();
        let summary = ws.pipeline();
        // 112_500 + 25_500 + 198_000 + 42_750
        assert_eq!(summary.weighted_total, 378_750);
        assert_eq!(summary.per_stage.len(), 4);
        assert!(summary.per_stage.iter().all(|(_, n)| *n == 1));
    }

    #[test]
    fn test_task_summary_and_open_order() {
        let ws = Workspace::sample();
        let summary = ws.task_summary();
        assert_eq!(summary, TaskSummary { pending: 2, in_progress: 1, completed: 1 });

        let open: Vec<u32> = ws.open_tasks().iter().map(|t| t.id).collect();
        assert_eq!(open, vec![1, 2, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_entities() {
        let ws = Workspace::sample();
        let clients = vec![client("Alexander Ivanov", "@alex_ivanov"), client("Maria", "@maria_p")];

        let results = ws.search("IVANOV", &clients);
        assert_eq!(results.clients.len(), 1);
        assert_eq!(results.deals.len(), 1);
        assert_eq!(results.tasks.len(), 1);
        assert!(results.channels.is_empty());
    }

    #[test]
    fn test_search_matches_handles_and_stages() {
        let ws = Workspace::sample();
        let clients = vec![client("Maria", "@maria_p")];
        assert_eq!(ws.search("maria_p", &clients).clients.len(), 1);
        assert_eq!(ws.search("negotiation", &clients).deals.len(), 1);
    }

    #[test]
    fn test_blank_query_matches_everything() {
        let ws = Workspace::sample();
        let clients = vec![client("Maria", "@maria_p")];
        assert_eq!(ws.search("   ", &clients).total(), 1 + 4 + 4 + 4);
    }
}
