use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bakery Ledger API",
        version = "0.1.0",
        description = r#"
# Bakery Ledger

Order, receivables and sales tracking for a home bakery.

- **Varieties** and **Shops/Customers**: the catalogue orders refer to
- **Orders**: quantity, unit price, delivery date and payment state
  (`paid`, `unpaid`, or `partial` with an amount strictly between 0 and the total)
- **Reports**: overall and monthly sales, pending balances, estimated margin
- **Cost breakdown**: ingredient needs for a month of brownie orders

Data lives either in a SQL database or in a spreadsheet, chosen with
`storage_backend`. Spreadsheet reads are cached; `POST /api/v1/cache/refresh`
drops the cache.

## Error Handling

Failures return:

```json
{
  "error": "Bad Request",
  "message": "Validation error: Invalid date format",
  "request_id": "5d0c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Dashboard", description = "Quick order entry data"),
        (name = "Varieties", description = "Brownie varieties and default prices"),
        (name = "Shops", description = "Shops and customers, balances and bills"),
        (name = "Orders", description = "Order entry, history and payments"),
        (name = "Reports", description = "Sales reports and ingredient costing"),
        (name = "Maintenance", description = "Spreadsheet cache control"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::dashboard::dashboard,
        crate::handlers::varieties::list_varieties,
        crate::handlers::varieties::create_variety,
        crate::handlers::varieties::update_variety,
        crate::handlers::varieties::delete_variety,
        crate::handlers::shops::list_shops,
        crate::handlers::shops::create_shop,
        crate::handlers::shops::update_shop,
        crate::handlers::shops::delete_shop,
        crate::handlers::shops::shop_bill,
        crate::handlers::orders::order_history,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::edit_order,
        crate::handlers::orders::mark_paid,
        crate::handlers::orders::mark_all_paid,
        crate::handlers::orders::delete_all_orders,
        crate::handlers::reports::report_years,
        crate::handlers::reports::overall_report,
        crate::handlers::reports::monthly_report,
        crate::handlers::costing::cost_breakdown,
        crate::handlers::cache::refresh_cache,
        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::models::Variety,
            crate::models::Shop,
            crate::models::Order,
            crate::models::PaymentStatus,
            crate::services::OrderView,
            crate::services::varieties::VarietyRequest,
            crate::services::shops::ShopRequest,
            crate::services::orders::OrderRequest,
            crate::services::costing::CostBreakdownRequest,
            crate::handlers::common::ResponseMeta,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
