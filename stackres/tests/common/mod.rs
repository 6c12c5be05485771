//! Shared test utilities for stackres integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::routing::put;
use serde_json::{Value, json};
use stackres::{
    Dispatcher, HandlerConfig, InvocationContext, MemoryProvider, Providers, Registry, Responder,
    ResponseBody, ResponseError,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const LOG_STREAM: &str = "2024/05/01/[$LATEST]0123456789abcdef";

/// Provider state covering every handler.
pub fn fixture() -> Value {
    json!({
        "AccountId": "123456789012",
        "Region": "eu-west-1",
        "HostedZones": [
            {
                "HostedZone": {"Id": "/hostedzone/ZPUBLIC", "Name": "example.com.", "Config": {"Comment": "public", "PrivateZone": false}},
                "VPCs": []
            },
            {
                "HostedZone": {"Id": "/hostedzone/ZPRIVATE", "Name": "example.com.", "Config": {"Comment": "internal", "PrivateZone": true}},
                "VPCs": [{"VPCId": "vpc-main", "VPCRegion": "eu-west-1"}]
            },
            {
                "HostedZone": {"Id": "/hostedzone/ZDB1", "Name": "prod-db.", "Config": {"PrivateZone": true}},
                "VPCs": [{"VPCId": "vpc-main", "VPCRegion": "eu-west-1"}]
            },
            {
                "HostedZone": {"Id": "/hostedzone/ZDB2", "Name": "prod-db.", "Config": {"PrivateZone": true}},
                "VPCs": [{"VPCId": "vpc-main", "VPCRegion": "eu-west-1"}]
            }
        ],
        "HostedZoneTags": [
            {"ResourceId": "ZDB2", "Tags": [{"Key": "env", "Value": "prod"}]}
        ],
        "Aliases": [
            {"AliasName": "alias/app", "AliasArn": "arn:aws:kms:eu-west-1:123456789012:alias/app", "TargetKeyId": "key-a"}
        ],
        "CacheClusters": [
            {"CacheClusterId": "prod-db", "CacheClusterStatus": "available", "CacheNodeType": "cache.r6g.large",
             "Engine": "redis", "EngineVersion": "7.0.7",
             "SecurityGroups": [{"SecurityGroupId": "sg-db", "Status": "active"}]},
            {"CacheClusterId": "sessions-001", "CacheClusterStatus": "available",
             "SecurityGroups": [{"SecurityGroupId": "sg-cache", "Status": "active"}]},
            {"CacheClusterId": "sessions-002", "CacheClusterStatus": "available",
             "SecurityGroups": [{"SecurityGroupId": "sg-cache", "Status": "active"}, {"SecurityGroupId": "sg-ops", "Status": "active"}]}
        ],
        "ReplicationGroups": [
            {"ReplicationGroupId": "sessions", "Description": "web sessions", "Status": "available",
             "MemberClusters": ["sessions-001", "sessions-002"]}
        ],
        "Vpcs": [
            {"VpcId": "vpc-main", "CidrBlock": "10.0.0.0/16", "State": "available", "DhcpOptionsId": "dopt-1",
             "OwnerId": "123456789012", "Tags": [{"Key": "Name", "Value": "main"}]}
        ],
        "Subnets": [
            {"SubnetId": "subnet-a", "VpcId": "vpc-main", "CidrBlock": "10.0.1.0/24", "State": "available",
             "Tags": [{"Key": "Type", "Value": "Public"}]},
            {"SubnetId": "subnet-b", "VpcId": "vpc-main", "CidrBlock": "10.0.2.0/24", "State": "available",
             "Tags": [{"Key": "Type", "Value": "Private"}]}
        ],
        "Images": [
            {"ImageId": "ami-1", "Name": "app-1.0", "OwnerId": "123456789012", "State": "available",
             "CreationDate": "2024-02-01T10:00:00.000Z", "Public": false},
            {"ImageId": "ami-2", "Name": "app-1.1", "OwnerId": "123456789012", "State": "available",
             "CreationDate": "2024-03-01T10:00:00.000Z", "Public": false}
        ],
        "Stacks": [
            {"StackName": "network", "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/network/1",
             "StackStatus": "CREATE_COMPLETE",
             "Outputs": [{"OutputKey": "VpcId", "OutputValue": "vpc-main"}]}
        ]
    })
}

pub fn provider() -> Arc<MemoryProvider> {
    Arc::new(MemoryProvider::new(
        serde_json::from_value(fixture()).expect("Invalid fixture"),
    ))
}

pub fn context() -> InvocationContext {
    InvocationContext::new(
        LOG_STREAM,
        Some("arn:aws:lambda:eu-west-1:123456789012:function:stackres".to_string()),
        None,
    )
}

pub fn dispatcher(provider: Arc<MemoryProvider>, responder: Arc<dyn Responder>) -> Dispatcher {
    let registry = Registry::new(&Providers::from_memory(provider), &HandlerConfig::default());
    Dispatcher::new(registry, responder)
}

/// Responder that keeps every body instead of sending it.
#[derive(Default)]
pub struct RecordingResponder {
    pub sent: Mutex<Vec<(String, ResponseBody)>>,
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn respond(&self, url: &str, body: &ResponseBody) -> Result<(), ResponseError> {
        self.sent.lock().await.push((url.to_string(), body.clone()));
        Ok(())
    }
}

/// A PUT captured by [`CallbackServer`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct CaptureState {
    captured: Arc<Mutex<Vec<Captured>>>,
    status: StatusCode,
}

/// Local stand-in for the pre-signed callback endpoint.
pub struct CallbackServer {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl CallbackServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_status(StatusCode::OK).await
    }

    /// Spawn a server that answers every PUT with `status`.
    pub async fn spawn_with_status(status: StatusCode) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = CaptureState {
            captured: captured.clone(),
            status,
        };
        let router = Router::new()
            .route("/callback", put(capture))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            captured,
            shutdown_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/callback", self.addr)
    }

    pub async fn captured(&self) -> Vec<Captured> {
        self.captured.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn capture(State(state): State<CaptureState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.captured.lock().await.push(Captured { content_type, body });
    state.status
}
