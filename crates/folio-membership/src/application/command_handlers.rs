//! Command handlers for the Membership context.

use folio_core::clock::Clock;
use folio_core::command::Command;
use folio_core::error::DomainError;
use folio_core::outbox::OutboxEnvelope;
use folio_outbox::unit_of_work::UnitOfWorkFactory;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::domain::commands::{ChangeUserName, RegisterUser};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct MembershipCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The outbox envelopes committed with the change.
    pub envelopes: Vec<OutboxEnvelope>,
}

/// Handles the `RegisterUser` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the user id is taken or the details
/// are invalid, or the store's error if persisting fails.
#[instrument(skip_all, fields(command = command.command_type(), user_id = %command.user_id))]
pub async fn handle_register_user(
    command: &RegisterUser,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<MembershipCommandResult, DomainError> {
    let mut uow = uow_factory.begin().await?;
    if uow.load::<User>(command.user_id).await?.is_some() {
        return Err(DomainError::Validation(format!(
            "user {} already exists",
            command.user_id
        )));
    }

    let mut user = User::register(
        command.user_id,
        &command.email,
        &command.first_name,
        &command.last_name,
        command.correlation_id(),
        clock,
    )?;
    uow.save(&mut user).await?;
    let envelopes = uow.commit().await?;

    info!("user registered");
    Ok(MembershipCommandResult {
        aggregate_id: command.user_id,
        envelopes,
    })
}

/// Handles the `ChangeUserName` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist or
/// `DomainError::Validation` if the new name is invalid.
#[instrument(skip_all, fields(command = command.command_type(), user_id = %command.user_id))]
pub async fn handle_change_user_name(
    command: &ChangeUserName,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<MembershipCommandResult, DomainError> {
    let mut uow = uow_factory.begin().await?;
    let mut user = uow.get::<User>(command.user_id).await?;

    user.change_name(
        &command.first_name,
        &command.last_name,
        command.correlation_id(),
        clock,
    )?;
    uow.save(&mut user).await?;
    let envelopes = uow.commit().await?;

    Ok(MembershipCommandResult {
        aggregate_id: command.user_id,
        envelopes,
    })
}
