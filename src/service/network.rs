//! VPCs, subnets, route tables and route entries.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::models::{map_to_tags, Filter, Route, RouteTable, Subnet, Vpc};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;
use crate::retry::{retry, RetryError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateVpcResponse {
    vpc: Vpc,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSubnetResponse {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRouteTableResponse {
    route_table: RouteTable,
}

/// Fields of a route entry as written by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub destination_cidr_block: String,
    pub gateway_type: String,
    pub gateway_id: String,
    pub description: String,
}

impl RouteSpec {
    fn matches(&self, route: &Route) -> bool {
        route.destination_cidr_block == self.destination_cidr_block
            && route.gateway_type == self.gateway_type
            && route.gateway_id == self.gateway_id
    }
}

fn with_filters(mut request: Value, filters: Vec<Filter>) -> Value {
    if !filters.is_empty() {
        request["Filters"] = json!(filters);
    }
    request
}

fn with_tags(request: &mut Value, tags: &BTreeMap<String, String>) {
    if !tags.is_empty() {
        request["Tags"] = json!(map_to_tags(tags));
    }
}

impl VpcService {
    pub async fn create_vpc(
        &self,
        name: &str,
        cidr_block: &str,
        is_multicast: bool,
        dns_servers: &[String],
        tags: &BTreeMap<String, String>,
    ) -> Result<String, ProviderError> {
        let mut request = json!({
            "VpcName": name,
            "CidrBlock": cidr_block,
            "EnableMulticast": is_multicast.to_string(),
        });
        if !dns_servers.is_empty() {
            request["DnsServers"] = json!(dns_servers);
        }
        with_tags(&mut request, tags);

        let response: CreateVpcResponse = self.write("CreateVpc", &request).await?;
        info!(vpc_id = %response.vpc.vpc_id, "created vpc");
        Ok(response.vpc.vpc_id)
    }

    pub async fn describe_vpc(&self, id: &str) -> Result<Option<Vpc>, ProviderError> {
        let vpcs = found(self.describe_vpcs(vec![Filter::new("vpc-id", id)]).await)?;
        Ok(vpcs.and_then(|v| v.into_iter().find(|vpc| vpc.vpc_id == id)))
    }

    pub async fn describe_vpcs(&self, filters: Vec<Filter>) -> Result<Vec<Vpc>, ProviderError> {
        self.describe_all("DescribeVpcs", with_filters(json!({}), filters), "VpcSet", Paging::Strings)
            .await
    }

    pub async fn modify_vpc(
        &self,
        id: &str,
        name: &str,
        is_multicast: bool,
        dns_servers: &[String],
    ) -> Result<(), ProviderError> {
        let mut request = json!({
            "VpcId": id,
            "VpcName": name,
            "EnableMulticast": is_multicast.to_string(),
        });
        if !dns_servers.is_empty() {
            request["DnsServers"] = json!(dns_servers);
        }
        let _: IgnoredAny = self.write("ModifyVpcAttribute", &request).await?;
        Ok(())
    }

    pub async fn delete_vpc(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self.write("DeleteVpc", &json!({"VpcId": id})).await?;
        info!(vpc_id = %id, "deleted vpc");
        Ok(())
    }

    /// The main route table created together with a VPC.
    pub async fn default_route_table_id(&self, vpc_id: &str) -> Result<Option<String>, ProviderError> {
        let tables = self
            .describe_route_tables(vec![
                Filter::new("vpc-id", vpc_id),
                Filter::new("association.main", "true"),
            ])
            .await?;
        Ok(tables.into_iter().find(|t| t.main).map(|t| t.route_table_id))
    }

    pub async fn create_subnet(
        &self,
        vpc_id: &str,
        name: &str,
        cidr_block: &str,
        zone: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, ProviderError> {
        let mut request = json!({
            "VpcId": vpc_id,
            "SubnetName": name,
            "CidrBlock": cidr_block,
            "Zone": zone,
        });
        with_tags(&mut request, tags);

        let response: CreateSubnetResponse = self.write("CreateSubnet", &request).await?;
        info!(subnet_id = %response.subnet.subnet_id, vpc_id, "created subnet");
        Ok(response.subnet.subnet_id)
    }

    pub async fn describe_subnet(&self, id: &str) -> Result<Option<Subnet>, ProviderError> {
        let subnets = found(self.describe_subnets(vec![Filter::new("subnet-id", id)]).await)?;
        Ok(subnets.and_then(|s| s.into_iter().find(|subnet| subnet.subnet_id == id)))
    }

    pub async fn describe_subnets(&self, filters: Vec<Filter>) -> Result<Vec<Subnet>, ProviderError> {
        self.describe_all(
            "DescribeSubnets",
            with_filters(json!({}), filters),
            "SubnetSet",
            Paging::Strings,
        )
        .await
    }

    pub async fn modify_subnet(&self, id: &str, name: &str, is_multicast: bool) -> Result<(), ProviderError> {
        let request = json!({
            "SubnetId": id,
            "SubnetName": name,
            "EnableBroadcast": is_multicast.to_string(),
        });
        let _: IgnoredAny = self.write("ModifySubnetAttribute", &request).await?;
        Ok(())
    }

    pub async fn replace_route_table_association(
        &self,
        subnet_id: &str,
        route_table_id: &str,
    ) -> Result<(), ProviderError> {
        let request = json!({"SubnetId": subnet_id, "RouteTableId": route_table_id});
        let _: IgnoredAny = self.write("ReplaceRouteTableAssociation", &request).await?;
        Ok(())
    }

    pub async fn delete_subnet(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self.write("DeleteSubnet", &json!({"SubnetId": id})).await?;
        info!(subnet_id = %id, "deleted subnet");
        Ok(())
    }

    pub async fn create_route_table(
        &self,
        vpc_id: &str,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, ProviderError> {
        let mut request = json!({"VpcId": vpc_id, "RouteTableName": name});
        with_tags(&mut request, tags);

        let response: CreateRouteTableResponse = self.write("CreateRouteTable", &request).await?;
        info!(route_table_id = %response.route_table.route_table_id, vpc_id, "created route table");
        Ok(response.route_table.route_table_id)
    }

    pub async fn describe_route_table(&self, id: &str) -> Result<Option<RouteTable>, ProviderError> {
        let tables = found(
            self.describe_route_tables(vec![Filter::new("route-table-id", id)])
                .await,
        )?;
        Ok(tables.and_then(|t| t.into_iter().find(|table| table.route_table_id == id)))
    }

    pub async fn describe_route_tables(&self, filters: Vec<Filter>) -> Result<Vec<RouteTable>, ProviderError> {
        self.describe_all(
            "DescribeRouteTables",
            with_filters(json!({}), filters),
            "RouteTableSet",
            Paging::Strings,
        )
        .await
    }

    pub async fn modify_route_table(&self, id: &str, name: &str) -> Result<(), ProviderError> {
        let request = json!({"RouteTableId": id, "RouteTableName": name});
        let _: IgnoredAny = self.write("ModifyRouteTableAttribute", &request).await?;
        Ok(())
    }

    pub async fn delete_route_table(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteRouteTable", &json!({"RouteTableId": id}))
            .await?;
        info!(route_table_id = %id, "deleted route table");
        Ok(())
    }

    /// Add one route and return its entry ID.
    ///
    /// The create response does not carry the ID reliably, so the table is
    /// read back until a route with the same destination and next hop shows up.
    pub async fn create_route(&self, route_table_id: &str, spec: &RouteSpec) -> Result<u64, ProviderError> {
        let request = json!({
            "RouteTableId": route_table_id,
            "Routes": [{
                "DestinationCidrBlock": spec.destination_cidr_block,
                "GatewayType": spec.gateway_type,
                "GatewayId": spec.gateway_id,
                "RouteDescription": spec.description,
            }],
        });
        let _: IgnoredAny = self.write("CreateRoutes", &request).await?;

        let policy = self.policy();
        retry(policy.read_timeout, policy.interval, || async move {
            let table = self
                .describe_route_table(route_table_id)
                .await
                .map_err(RetryError::Permanent)?
                .ok_or_else(|| {
                    RetryError::Permanent(ProviderError::NotFound(format!(
                        "route table {} of the route entry",
                        route_table_id
                    )))
                })?;
            match table.route_set.iter().find(|r| spec.matches(r)) {
                Some(route) => Ok(route.route_id),
                None => {
                    warn!(route_table_id, destination = %spec.destination_cidr_block, "route entry not visible yet");
                    Err(RetryError::Transient(ProviderError::NotFound(format!(
                        "route entry id in route table {}",
                        route_table_id
                    ))))
                },
            }
        })
        .await
    }

    /// Route `entry_id` of a table, `None` if the table or the route is gone.
    pub async fn describe_route(
        &self,
        route_table_id: &str,
        entry_id: u64,
    ) -> Result<Option<Route>, ProviderError> {
        Ok(self
            .describe_route_table(route_table_id)
            .await?
            .and_then(|table| table.route_set.into_iter().find(|r| r.route_id == entry_id)))
    }

    pub async fn delete_route(&self, route_table_id: &str, entry_id: u64) -> Result<(), ProviderError> {
        let request = json!({
            "RouteTableId": route_table_id,
            "Routes": [{"RouteId": entry_id}],
        });
        let _: IgnoredAny = self.write("DeleteRoutes", &request).await?;
        Ok(())
    }
}
