use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::support_ticket::{NewSupportTicket, SupportTicket},
    use_cases::settings::SupportTicketRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct SupportTicketDb {
    id: Uuid,
    user_id: Uuid,
    ticket_number: String,
    issue_type: String,
    description: String,
    attachment_url: Option<String>,
    status: String,
    created_at: NaiveDateTime,
}

impl SupportTicketDb {
    fn into_ticket(self) -> AppResult<SupportTicket> {
        Ok(SupportTicket {
            id: self.id,
            user_id: self.user_id,
            ticket_number: self.ticket_number,
            issue_type: parse_enum(&self.issue_type, "issue_type")?,
            description: self.description,
            attachment_url: self.attachment_url,
            status: parse_enum(&self.status, "ticket status")?,
            created_at: self.created_at,
        })
    }
}

const TICKET_COLUMNS: &str =
    "id, user_id, ticket_number, issue_type, description, attachment_url, status, created_at";

#[async_trait]
impl SupportTicketRepo for PostgresPersistence {
    async fn insert(
        &self,
        ticket_number: &str,
        ticket: NewSupportTicket,
    ) -> AppResult<SupportTicket> {
        let row = sqlx::query_as::<_, SupportTicketDb>(&format!(
            "INSERT INTO support_tickets (id, user_id, ticket_number, issue_type, description, attachment_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(ticket.user_id)
        .bind(ticket_number)
        .bind(ticket.issue_type.as_ref())
        .bind(&ticket.description)
        .bind(&ticket.attachment_url)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_ticket()
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SupportTicket>> {
        let rows = sqlx::query_as::<_, SupportTicketDb>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets
             WHERE user_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.into_iter().map(SupportTicketDb::into_ticket).collect()
    }
}
