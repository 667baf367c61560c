//! End-to-end handler tests against a mocked Tencent Cloud API.

use std::time::Duration;

use serde_json::{json, Value};
use tencentcloud_vpc_provider::retry::RetryPolicy;
use tencentcloud_vpc_provider::{ProviderError, ProviderService, TencentCloudProvider};
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(body: Value) -> ResponseTemplate {
    let mut response = body;
    response["RequestId"] = json!("req-test");
    ResponseTemplate::new(200).set_body_json(json!({ "Response": response }))
}

fn api_error(code: &str) -> ResponseTemplate {
    ok(json!({"Error": {"Code": code, "Message": "mocked failure"}}))
}

async fn configured(server: &MockServer) -> TencentCloudProvider {
    let provider = TencentCloudProvider::new()
        .with_endpoint(server.uri())
        .with_retry_policy(RetryPolicy {
            read_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_millis(300),
            interval: Duration::from_millis(10),
        });
    let diagnostics = provider
        .configure(json!({
            "secret_id": "AKIDexample",
            "secret_key": "secret",
            "region": "ap-guangzhou",
        }))
        .await
        .unwrap();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    provider
}

fn vpc(name: &str) -> Value {
    json!({
        "VpcId": "vpc-abc",
        "VpcName": name,
        "CidrBlock": "10.0.0.0/16",
        "IsDefault": false,
        "EnableMulticast": true,
        "CreatedTime": "2024-05-01 10:00:00",
        "DnsServerSet": ["183.60.83.19"],
        "TagSet": [{"Key": "env", "Value": "dev"}]
    })
}

async fn mount_vpc_reads(server: &MockServer, name: &str) {
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeVpcs"))
        .respond_with(ok(json!({"TotalCount": 1, "VpcSet": [vpc(name)]})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeRouteTables"))
        .respond_with(ok(json!({
            "TotalCount": 1,
            "RouteTableSet": [{"RouteTableId": "rtb-main", "VpcId": "vpc-abc", "Main": true}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_vpc_create_reads_back_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "CreateVpc"))
        .and(body_partial_json(json!({
            "VpcName": "main",
            "CidrBlock": "10.0.0.0/16",
            "EnableMulticast": "true",
            "Tags": [{"Key": "env", "Value": "dev"}]
        })))
        .respond_with(ok(json!({"Vpc": {"VpcId": "vpc-abc"}})))
        .expect(1)
        .mount(&server)
        .await;
    mount_vpc_reads(&server, "main").await;

    let provider = configured(&server).await;
    let plan = provider
        .plan(
            "tencentcloud_vpc",
            None,
            json!({"name": "main", "cidr_block": "10.0.0.0/16", "tags": {"env": "dev"}}),
            json!({}),
        )
        .await
        .unwrap();
    assert_eq!(plan.planned_state["is_multicast"], json!(true));

    let state = provider.create("tencentcloud_vpc", plan.planned_state).await.unwrap();
    assert_eq!(state["id"], "vpc-abc");
    assert_eq!(state["default_route_table_id"], "rtb-main");
    assert_eq!(state["dns_servers"], json!(["183.60.83.19"]));
    assert_eq!(state["tags"]["env"], "dev");
}

#[tokio::test]
async fn test_vpc_update_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "ModifyVpcAttribute"))
        .and(body_partial_json(json!({"VpcId": "vpc-abc", "VpcName": "renamed"})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DeleteVpc"))
        .and(body_partial_json(json!({"VpcId": "vpc-abc"})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_vpc_reads(&server, "renamed").await;

    let provider = configured(&server).await;
    let prior = json!({
        "id": "vpc-abc",
        "name": "main",
        "cidr_block": "10.0.0.0/16",
        "is_multicast": true,
        "dns_servers": ["183.60.83.19"],
        "tags": {"env": "dev"},
        "create_time": "2024-05-01 10:00:00",
    });

    let plan = provider
        .plan(
            "tencentcloud_vpc",
            Some(prior.clone()),
            json!({"name": "renamed", "cidr_block": "10.0.0.0/16", "tags": {"env": "dev"}}),
            json!({}),
        )
        .await
        .unwrap();
    assert!(!plan.requires_replace);
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].path, "name");

    let state = provider
        .update("tencentcloud_vpc", prior, plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["name"], "renamed");

    provider.delete("tencentcloud_vpc", state).await.unwrap();
}

#[tokio::test]
async fn test_cidr_change_plans_replacement() {
    let server = MockServer::start().await;
    let provider = configured(&server).await;

    let plan = provider
        .plan(
            "tencentcloud_vpc",
            Some(json!({"id": "vpc-abc", "name": "main", "cidr_block": "10.0.0.0/16", "is_multicast": true})),
            json!({"name": "main", "cidr_block": "172.16.0.0/16"}),
            json!({}),
        )
        .await
        .unwrap();
    assert!(plan.requires_replace);

    let destroy = provider
        .plan("tencentcloud_vpc", Some(json!({"id": "vpc-abc", "name": "main"})), Value::Null, json!({}))
        .await
        .unwrap();
    assert!(destroy.planned_state.is_null());
    assert_eq!(destroy.changes.len(), 2);
}

#[tokio::test]
async fn test_read_of_vanished_vpc_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeVpcs"))
        .respond_with(ok(json!({"TotalCount": 0, "VpcSet": []})))
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let state = provider
        .read("tencentcloud_vpc", json!({"id": "vpc-gone", "name": "main"}))
        .await
        .unwrap();
    assert!(state.is_null());

    let err = provider.import_resource("tencentcloud_vpc", "vpc-gone").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_import_reads_by_id() {
    let server = MockServer::start().await;
    mount_vpc_reads(&server, "main").await;

    let provider = configured(&server).await;
    let imported = provider.import_resource("tencentcloud_vpc", "vpc-abc").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, "tencentcloud_vpc");
    assert_eq!(imported[0].state["cidr_block"], "10.0.0.0/16");
}

#[tokio::test]
async fn test_api_errors_surface_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "CreateVpc"))
        .respond_with(api_error("LimitExceeded.Vpc"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let err = provider
        .create("tencentcloud_vpc", json!({"name": "main", "cidr_block": "10.0.0.0/16"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ResourceExhausted(_)));
    assert!(err.to_string().contains("LimitExceeded.Vpc"));
}

#[tokio::test]
async fn test_eips_data_source_pages_through_results() {
    let server = MockServer::start().await;
    let first: Vec<Value> = (0..100)
        .map(|i| json!({"AddressId": format!("eip-{:03}", i), "AddressIp": format!("1.1.1.{}", i)}))
        .collect();
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeAddresses"))
        .and(body_partial_json(json!({"Offset": 0, "Limit": 100})))
        .respond_with(ok(json!({"TotalCount": 101, "AddressSet": first})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeAddresses"))
        .and(body_partial_json(json!({"Offset": 100, "Limit": 100})))
        .respond_with(ok(json!({
            "TotalCount": 101,
            "AddressSet": [{"AddressId": "eip-100", "AddressIp": "1.1.2.0"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let state = provider.read_data_source("tencentcloud_eips", json!({})).await.unwrap();

    let list = state["eip_list"].as_array().unwrap();
    assert_eq!(list.len(), 101);
    assert_eq!(list[100]["eip_id"], "eip-100");
    assert!(state["id"].as_str().unwrap().parse::<u32>().is_ok());
}

#[tokio::test]
async fn test_missing_credentials_are_diagnostics() {
    let provider = TencentCloudProvider::new();
    let diagnostics = provider.configure(json!({"region": "ap-guangzhou"})).await.unwrap();

    // Env may supply either key on a developer machine.
    if std::env::var("TENCENTCLOUD_SECRET_ID").is_err() {
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("secret_id")));
    }
}

#[tokio::test]
async fn test_subnet_create_failure_keeps_created_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "CreateSubnet"))
        .respond_with(ok(json!({"Subnet": {"SubnetId": "subnet-leak", "VpcId": "vpc-abc"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "ModifySubnetAttribute"))
        .respond_with(api_error("InvalidParameter"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let err = provider
        .create(
            "tencentcloud_subnet",
            json!({
                "vpc_id": "vpc-abc",
                "availability_zone": "ap-guangzhou-3",
                "name": "app",
                "cidr_block": "10.0.1.0/24",
                "is_multicast": true,
            }),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::Partial { state, source } => {
            assert_eq!(state["id"], "subnet-leak");
            assert_eq!(state["name"], "app");
            assert!(matches!(*source, ProviderError::InvalidRequest(_)));
        },
        other => panic!("expected partial state, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_before_creation_has_no_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "CreateSubnet"))
        .respond_with(api_error("InvalidParameterValue.SubnetConflict"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let err = provider
        .create(
            "tencentcloud_subnet",
            json!({
                "vpc_id": "vpc-abc",
                "availability_zone": "ap-guangzhou-3",
                "name": "app",
                "cidr_block": "10.0.1.0/24",
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_nat_gateway_failed_wait_keeps_planned_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "CreateNatGateway"))
        .respond_with(ok(json!({"NatGatewaySet": [{"NatGatewayId": "nat-1", "State": "PENDING"}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-TC-Action", "DescribeNatGateways"))
        .respond_with(ok(json!({"TotalCount": 1, "NatGatewaySet": [{"NatGatewayId": "nat-1", "State": "FAILED"}]})))
        .mount(&server)
        .await;

    let provider = configured(&server).await;
    let err = provider
        .create(
            "tencentcloud_nat_gateway",
            json!({
                "vpc_id": "vpc-abc",
                "name": "egress",
                "max_concurrent": 1000000,
                "bandwidth": 100,
                "assigned_eip_set": ["1.1.1.1"],
            }),
        )
        .await
        .unwrap_err();

    let ProviderError::Partial { state, .. } = err else {
        panic!("expected partial state");
    };
    assert_eq!(state["id"], "nat-1");
    assert_eq!(state["name"], "egress");
    assert_eq!(state["vpc_id"], "vpc-abc");
}
