// src/services/document_service.rs

use chrono::{NaiveDate, Utc};
use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use rust_decimal::Decimal;
use sqlx::{Acquire, Postgres};

use crate::{
    common::error::AppError,
    config::CompanyConfig,
    db::CustomerRepository,
    models::{
        customer::Customer,
        sales::{SaleRecordDetail, VatBreakdown},
    },
    services::sales_service::SalesService,
};

#[derive(Clone)]
pub struct DocumentService {
    sales_service: SalesService,
    customer_repo: CustomerRepository,
    company: CompanyConfig,
}

/// Tudo o que vai impresso na fatura, já calculado.
#[derive(Debug, Clone)]
pub struct InvoicePrint {
    pub number: Option<String>,
    pub title: String,
    pub issue_date: NaiveDate,
    pub customer_name: String,
    pub customer_tax_id: String,
    pub customer_address: Option<String>,
    pub items: Vec<PrintItem>,
    pub breakdown: Vec<VatBreakdown>,
    pub total_with_vat: Decimal,
}

#[derive(Debug, Clone)]
pub struct PrintItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl InvoicePrint {
    pub fn from_detail(detail: &SaleRecordDetail, customer: &Customer) -> Self {
        let items = detail
            .lines
            .iter()
            .map(|l| PrintItem {
                description: l.description.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                total: l.line_total,
            })
            .chain(detail.complements.iter().map(|c| PrintItem {
                description: c.description.clone(),
                quantity: c.quantity,
                unit_price: c.unit_price,
                total: c.line_total,
            }))
            .collect();

        let address = [customer.address.as_deref(), customer.postal_code.as_deref(), customer.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            number: detail.header.invoice_number.clone(),
            title: detail.header.title.clone(),
            issue_date: detail.header.issued_at.unwrap_or_else(Utc::now).date_naive(),
            customer_name: customer.name.clone(),
            customer_tax_id: customer.tax_id.clone(),
            customer_address: (!address.is_empty()).then_some(address),
            items,
            breakdown: detail.vat_breakdown(),
            total_with_vat: detail.total_with_vat(),
        }
    }
}

impl DocumentService {
    pub fn new(sales_service: SalesService, customer_repo: CustomerRepository, company: CompanyConfig) -> Self {
        Self {
            sales_service,
            customer_repo,
            company,
        }
    }

    pub async fn generate_invoice_pdf<'e, E>(&self, executor: E, sale_id: i64) -> Result<Vec<u8>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        // 1. Busca os dados
        let detail = self.sales_service.load_detail(&mut conn, sale_id).await?;
        let customer = self
            .customer_repo
            .find_by_id(&mut *conn, detail.header.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cliente {}", detail.header.customer_id)))?;

        // 2. Renderiza fora do banco
        let print = InvoicePrint::from_detail(&detail, &customer);
        render_invoice(&self.company, &print)
    }
}

/// URL de verificação da AEAT que vai dentro do QR.
pub fn verifactu_qr_url(
    base_url: &str,
    issuer_nif: &str,
    invoice_number: &str,
    issue_date: NaiveDate,
    total_with_vat: Decimal,
) -> Result<String, AppError> {
    let fecha = issue_date.format("%d-%m-%Y").to_string();
    let importe = format!("{:.2}", total_with_vat);

    reqwest::Url::parse_with_params(
        base_url,
        &[
            ("nif", issuer_nif),
            ("numserie", invoice_number),
            ("fecha", fecha.as_str()),
            ("importe", importe.as_str()),
        ],
    )
    .map(|url| url.to_string())
    .map_err(|e| AppError::Pdf(format!("URL do QR inválida: {}", e)))
}

pub fn render_invoice(company: &CompanyConfig, print: &InvoicePrint) -> Result<Vec<u8>, AppError> {
    let pdf_err = |e: genpdf::error::Error| AppError::Pdf(e.to_string());

    // Carrega a fonte da pasta configurada
    let font_family = genpdf::fonts::from_files(&company.fonts_dir, "Roboto", None)
        .map_err(|_| AppError::Pdf(format!("Fonte não encontrada na pasta {}", company.fonts_dir)))?;

    let mut doc = genpdf::Document::new(font_family);
    let heading = match &print.number {
        Some(number) => format!("FACTURA {}", number),
        None => "PRESUPUESTO (sin emitir)".to_string(),
    };
    doc.set_title(heading.clone());
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- EMISSOR ---
    doc.push(elements::Paragraph::new(company.name.clone()).styled(style::Style::new().bold().with_font_size(18)));
    doc.push(elements::Paragraph::new(format!("NIF: {}", company.nif)).styled(style::Style::new().with_font_size(10)));
    if let Some(addr) = &company.address {
        doc.push(elements::Paragraph::new(addr.clone()).styled(style::Style::new().with_font_size(10)));
    }

    doc.push(elements::Break::new(1.5));

    doc.push(elements::Paragraph::new(heading).styled(style::Style::new().bold().with_font_size(14)));
    doc.push(elements::Paragraph::new(format!("Fecha: {}", print.issue_date.format("%d/%m/%Y"))));
    doc.push(elements::Paragraph::new(format!("Concepto: {}", print.title)));

    // --- CLIENTE ---
    doc.push(elements::Break::new(1));
    doc.push(elements::Paragraph::new(format!("Cliente: {}", print.customer_name)));
    doc.push(elements::Paragraph::new(format!("NIF: {}", print.customer_tax_id)));
    if let Some(addr) = &print.customer_address {
        doc.push(elements::Paragraph::new(addr.clone()));
    }

    doc.push(elements::Break::new(2));

    // --- LINHAS ---
    // Pesos das colunas: Descrição (4), Qtd (1), Preço (2), Total (2)
    let mut table = elements::TableLayout::new(vec![4, 1, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let style_bold = style::Style::new().bold();
    table
        .row()
        .element(elements::Paragraph::new("Descripción").styled(style_bold))
        .element(elements::Paragraph::new("Cant.").styled(style_bold))
        .element(elements::Paragraph::new("Precio").styled(style_bold))
        .element(elements::Paragraph::new("Importe").styled(style_bold))
        .push()
        .map_err(pdf_err)?;

    for item in &print.items {
        table
            .row()
            .element(elements::Paragraph::new(item.description.clone()))
            .element(elements::Paragraph::new(format!("{:.2}", item.quantity)))
            .element(elements::Paragraph::new(format!("{:.2} €", item.unit_price)))
            .element(elements::Paragraph::new(format!("{:.2} €", item.total)))
            .push()
            .map_err(pdf_err)?;
    }

    doc.push(table);
    doc.push(elements::Break::new(2));

    // --- TOTAIS (por alíquota) ---
    for group in &print.breakdown {
        let mut line = elements::Paragraph::new(format!(
            "Base {:.2} € · IVA {:.2}% · Cuota {:.2} €",
            group.base, group.vat_rate, group.vat_amount
        ));
        line.set_alignment(genpdf::Alignment::Right);
        doc.push(line);
    }

    let mut total_paragraph = elements::Paragraph::new(format!("TOTAL: {:.2} €", print.total_with_vat));
    total_paragraph.set_alignment(genpdf::Alignment::Right);
    doc.push(total_paragraph.styled(style::Style::new().bold().with_font_size(12)));

    // --- QR VERIFACTU (só faturas emitidas) ---
    if let Some(number) = &print.number {
        let url = verifactu_qr_url(
            &company.qr_base_url,
            &company.nif,
            number,
            print.issue_date,
            print.total_with_vat,
        )?;

        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new("QR tributario: VERI*FACTU").styled(style::Style::new().bold().with_font_size(10)));

        let code = QrCode::new(url.as_bytes()).map_err(|e| AppError::Pdf(e.to_string()))?;
        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

        let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
            .map_err(pdf_err)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(pdf_image);

        doc.push(elements::Paragraph::new(url).styled(style::Style::new().italic().with_font_size(7)));
    }

    // Renderiza para buffer (memória)
    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(pdf_err)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_url_carries_aeat_parameters() {
        let url = verifactu_qr_url(
            "https://prewww2.aeat.es/wlpl/TIKE-CONT/ValidarQR",
            "B12345674",
            "F2026-000007",
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            Decimal::new(12100, 2),
        )
        .unwrap();

        assert_eq!(
            url,
            "https://prewww2.aeat.es/wlpl/TIKE-CONT/ValidarQR?nif=B12345674&numserie=F2026-000007&fecha=01-03-2026&importe=121.00"
        );
    }

    #[test]
    fn qr_url_rejects_garbage_base() {
        let err = verifactu_qr_url("not a url", "B1", "F1", NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), Decimal::ONE)
            .unwrap_err();
        assert!(matches!(err, AppError::Pdf(_)));
    }

    #[test]
    fn missing_fonts_is_a_pdf_error() {
        let company = CompanyConfig {
            fonts_dir: "/definitely/not/here".into(),
            ..CompanyConfig::default()
        };
        let print = InvoicePrint {
            number: None,
            title: "t".into(),
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            customer_name: "c".into(),
            customer_tax_id: "12345678Z".into(),
            customer_address: None,
            items: vec![],
            breakdown: vec![],
            total_with_vat: Decimal::ZERO,
        };

        assert!(matches!(render_invoice(&company, &print), Err(AppError::Pdf(_))));
    }
}
