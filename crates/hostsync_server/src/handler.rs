//! Routing of decoded requests to engine operations.

use crate::error::{GroupError, GroupResult};
use crate::permissions::Permissions;
use crate::server::{Credentials, GroupServer};
use hostsync_protocol::{
    GroupInfo, Operation, ProtocolError, RequestEnvelope, Response, ResponseBody, Status,
};
use hostsync_store::Store;
use std::sync::Arc;
use tracing::{debug, error};

/// Handler for protocol requests.
///
/// Cheap to clone; every clone shares the same engine.
pub struct RequestHandler<S: Store> {
    server: Arc<GroupServer<S>>,
}

impl<S: Store> Clone for RequestHandler<S> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
        }
    }
}

impl<S: Store> RequestHandler<S> {
    /// Creates a handler for an engine.
    pub fn new(server: Arc<GroupServer<S>>) -> Self {
        Self { server }
    }

    /// Returns the engine.
    pub fn server(&self) -> &Arc<GroupServer<S>> {
        &self.server
    }

    /// Handles one request. Long polls resolve only once their hook completes.
    pub async fn handle(&self, request: RequestEnvelope) -> Response {
        let RequestEnvelope {
            id,
            identity,
            session,
            op,
        } = request;
        let name = op.name();
        debug!(
            op = name,
            identity = identity.as_deref().unwrap_or(""),
            long_poll = op.is_long_poll(),
            "handling request"
        );

        let creds = Credentials::new(identity.unwrap_or_default(), session.unwrap_or_default());
        let response = match self.dispatch(&creds, op).await {
            Ok(body) => Response::ok(self.server.now(), body),
            Err(err) => self.failure(name, &err),
        };
        response.with_id(id)
    }

    /// Builds the response to a request that could not be decoded.
    pub fn malformed(&self, err: &ProtocolError) -> Response {
        Response::failure(
            self.server.now(),
            Status::Failed,
            "invalid_argument",
            err.to_string(),
        )
    }

    fn failure(&self, op: &str, err: &GroupError) -> Response {
        let status = if err.is_server_error() {
            error!(op, error = %err, "request failed");
            Status::Error
        } else {
            debug!(op, error = %err, "request rejected");
            Status::Failed
        };
        Response::failure(self.server.now(), status, err.tag(), err.to_string())
    }

    async fn dispatch(
        &self,
        creds: &Credentials,
        op: Operation,
    ) -> GroupResult<Option<ResponseBody>> {
        let server = &self.server;
        let body = match op {
            Operation::Register {
                credential,
                timeout_minutes,
            } => {
                let session = server.register(&creds.identity, &credential, timeout_minutes)?;
                Some(ResponseBody::Session { session })
            }
            Operation::Login { credential } => {
                let session = server.login(&creds.identity, &credential)?;
                Some(ResponseBody::Session { session })
            }
            Operation::Unregister => {
                server.unregister(creds)?;
                None
            }
            Operation::Logout => {
                server.logout(creds)?;
                None
            }
            Operation::Ping => {
                server.ping(creds)?;
                None
            }
            Operation::StartGroup { group, app } => {
                server.start_group(creds, &group, &app)?;
                None
            }
            Operation::CloseGroup { group } => {
                server.close_group(creds, &group)?;
                None
            }
            Operation::JoinGroup { group } => {
                server.join_group(creds, &group)?;
                None
            }
            Operation::LeaveGroup { group } => {
                server.leave_group(creds, &group)?;
                None
            }
            Operation::AddMember { group, member } => {
                server.add_member(creds, &group, &member)?;
                None
            }
            Operation::RemoveMember { group, member } => {
                server.remove_member(creds, &group, &member)?;
                None
            }
            Operation::ListGroups { app } => {
                let groups = server
                    .list_groups(creds, &app)?
                    .into_iter()
                    .map(|g| GroupInfo {
                        group: g.group_id,
                        app: g.app,
                        host: g.host,
                    })
                    .collect();
                Some(ResponseBody::Groups { groups })
            }
            Operation::ListMembers { group } => {
                let members = server.list_members(creds, &group)?;
                Some(ResponseBody::Members { members })
            }
            Operation::SetPermissions {
                group,
                fields,
                members,
                grants,
            } => {
                let permissions = Permissions::new(members, grants);
                server.set_permissions(creds, &group, &fields, &permissions)?;
                None
            }
            Operation::SubmitUpdate {
                group,
                fields,
                data,
                members,
                grants,
            } => {
                let permissions = (members.is_some() || grants.is_some())
                    .then(|| Permissions::new(members, grants));
                server.submit_update(creds, &group, &fields, &data, permissions.as_ref())?;
                None
            }
            Operation::ListenUpdates {
                group,
                ack,
                threshold,
            } => {
                let delivery = server.listen_updates(creds, &group, &ack, threshold).await?;
                Some(ResponseBody::Delivery { delivery })
            }
            Operation::FetchFields { group, fields } => {
                let data = server.fetch_fields(creds, &group, &fields)?;
                Some(ResponseBody::Fields { data })
            }
            Operation::SetThreshold { group, bytes } => {
                server.set_threshold(creds, &group, bytes)?;
                None
            }
            Operation::SubmitInput { group, input } => {
                server.submit_input(creds, &group, &input)?;
                None
            }
            Operation::ListenInput { group, ack } => {
                let delivery = server.listen_input(creds, &group, &ack).await?;
                Some(ResponseBody::Delivery { delivery })
            }
            Operation::StopListening { group, channel } => {
                server.stop_listening(creds, &group, channel)?;
                None
            }
            Operation::SetPrivate { key, data } => {
                server.set_private(creds, &key, &data)?;
                None
            }
            Operation::GetPrivate { key } => {
                let data = server.get_private(creds, &key)?;
                Some(ResponseBody::Private { data })
            }
            Operation::DeletePrivate { key } => {
                let deleted = server.delete_private(creds, &key)?;
                Some(ResponseBody::Deleted { deleted })
            }
        };
        Ok(body)
    }
}
