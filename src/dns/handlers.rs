use std::sync::Arc;

use tracing::{debug, error};
use trust_dns_proto::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_proto::rr::{Record, RecordType};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use crate::backend::Backend;
use crate::domain::synth::DNAME_TYPE;
use crate::error::Error;

/// The UDP/TCP transport carries no stream identifier, so every query
/// shares one cache partition. Callers with real isolation (per-circuit
/// resolvers) use the library API directly.
const TRANSPORT_ISOLATION: &str = "";

#[derive(Clone)]
pub struct Handler {
    backend: Arc<Backend>,
}

impl Handler {
    pub(super) fn new(backend: Arc<Backend>) -> Self {
        Handler { backend }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response).await;
        }

        let qname = request.query().name().to_string();
        let query_type = request.query().query_type();
        match self
            .backend
            .lookup(&qname, TRANSPORT_ISOLATION)
            .await
        {
            Ok(records) => {
                let (answers, authorities) = partition_records(records, query_type);
                self.send_records(request, response, answers, authorities)
                    .await
            }
            Err(err) => {
                debug!("lookup for \"{qname}\" failed: {err}");
                self.send_error(request, response, err.rcode()).await
            }
        }
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    async fn send_records<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        answers: Vec<Record>,
        authorities: Vec<Record>,
    ) -> Result<ResponseInfo, Error> {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), authorities.iter(), &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }

    async fn send_error<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        rcode: ResponseCode,
    ) -> Result<ResponseInfo, Error> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(rcode == ResponseCode::NXDomain);
        header.set_response_code(rcode);
        let response = builder.build_no_records(header);
        Ok(response_handle.send_response(response).await?)
    }
}

/// Splits synthesized records into answer and authority sections for one
/// query type. Delegation data (NS, and DS alongside it) belongs in the
/// authority section unless it was asked for directly; CNAME and DNAME
/// always accompany an answer.
fn partition_records(
    records: Vec<Record>,
    query_type: RecordType,
) -> (Vec<Record>, Vec<Record>) {
    let mut answers = Vec::new();
    let mut authorities = Vec::new();
    for record in records {
        let record_type = record.record_type();
        let delegation = record_type == RecordType::NS || record_type == RecordType::DS;
        if delegation && record_type != query_type && query_type != RecordType::ANY {
            authorities.push(record);
            continue;
        }
        let relevant = query_type == RecordType::ANY
            || record_type == query_type
            || record_type == RecordType::CNAME
            || record_type == RecordType::Unknown(DNAME_TYPE);
        if relevant {
            answers.push(record);
        }
    }
    (answers, authorities)
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(err) => {
                error!("error in RequestHandler: {:?}", err);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
