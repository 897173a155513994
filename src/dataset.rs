use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::models::{ActivityRecord, Category, Collaborator, RawActivity};
use crate::store::{ActivityStore, InMemoryStore, Snapshot};

pub fn load_store(path: &Path) -> anyhow::Result<InMemoryStore> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read data file {} (run `seed` to create one)",
            path.display()
        )
    })?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse data file {}", path.display()))?;
    info!(
        path = %path.display(),
        activities = snapshot.activities.len(),
        categories = snapshot.categories.len(),
        "loaded data file"
    );
    Ok(InMemoryStore::from_snapshot(snapshot))
}

pub fn write_store(path: &Path, store: &InMemoryStore) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(&store.to_snapshot())?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write data file {}", path.display()))?;
    Ok(())
}

pub fn seed_snapshot() -> Snapshot {
    let collaborators: Vec<Collaborator> = [
        ("user1", "João Silva", "joao.silva@example.com", "Fiscal"),
        ("user2", "Maria Oliveira", "maria.oliveira@example.com", "Contabilidade"),
        ("user3", "Carlos Pereira", "carlos.pereira@example.com", "RH"),
        ("user4", "Ana Costa", "ana.costa@example.com", "Fiscal"),
        ("user5", "Lucas Mendes", "lucas.mendes@example.com", "TI"),
        ("user6", "Sofia Alves", "sofia.alves@example.com", "Jurídico"),
        ("user7", "Eneide Santos", "eneide.santos@example.com", "Fiscal"),
        ("user8", "Matheus Gomes", "matheus.gomes@example.com", "Fiscal"),
        ("user9", "Rutenberg Lima", "rutenberg.lima@example.com", "Fiscal"),
        ("user10", "Zélia Castro", "zelia.castro@example.com", "Coordenação Fiscal"),
        ("user11", "Juliana Paes", "juliana.paes@example.com", "Contabilidade"),
    ]
    .into_iter()
    .map(|(id, name, email, department)| Collaborator {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        department: department.to_string(),
    })
    .collect();

    let categories: Vec<Category> = [
        (
            "cat1",
            "Obrigações",
            &["GIA ST", "SPED Fiscal", "SPED Contribuições", "DCTF", "DEFIS", "ECF", "RAIS", "Outra Obrigação"][..],
        ),
        (
            "cat2",
            "Agenda",
            &["Reunião Interna", "Reunião Externa", "Fechamento", "Alinhamento", "Capacitação", "Evento", "Feriado"][..],
        ),
        ("cat3", "Pagamento", &["Impostos Federais", "Impostos Estaduais", "Fornecedores", "Taxas"][..]),
        (
            "cat4",
            "Encaminhamento",
            &["Verificação de Apuração", "Solicitação de Crédito", "Ajuste Contábil", "Suporte TI"][..],
        ),
        (
            "cat5",
            "Atividade Extra",
            &["Projeto Interno", "Relatório Ad-hoc", "Análise de Viabilidade", "Outra Atividade"][..],
        ),
        (
            "cat6",
            "Checklist",
            &["Item de Fechamento Fiscal", "Item de Fechamento Contábil", "Onboarding RH"][..],
        ),
    ]
    .into_iter()
    .map(|(id, name, subcategories)| Category {
        id: id.to_string(),
        name: name.to_string(),
        subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
    })
    .collect();

    let person = |index: usize| collaborators.get(index).cloned();
    let text = |value: &str| Some(value.to_string());

    let raw = vec![
        RawActivity {
            id: "atv1".into(),
            title: "GIA ST - CE (Jul/25)".into(),
            category: "Obrigações".into(),
            subcategory: text("GIA ST"),
            status: text("Pendente"),
            priority: text("Alta"),
            description: text("Entrega da GIA-ST do Ceará referente a julho de 2025."),
            responsible: person(0),
            company_deadline: text("2025-08-19"),
            reference_date: text("2025-07-01"),
            ..Default::default()
        },
        RawActivity {
            id: "atv2".into(),
            title: "SPED Fiscal - PE (Jun/25)".into(),
            category: "Obrigações".into(),
            subcategory: text("SPED Fiscal"),
            status: text("Concluído"),
            priority: text("Média"),
            description: text("Envio do SPED Fiscal de Pernambuco referente a junho."),
            responsible: person(1),
            company_deadline: text("2025-07-24"),
            reference_date: text("2025-06-01"),
            completed_at: text("2025-07-22T10:30:00Z"),
            ..Default::default()
        },
        RawActivity {
            id: "atv3".into(),
            title: "RAIS (Ano 2024)".into(),
            category: "Obrigações".into(),
            subcategory: text("RAIS"),
            status: text("Concluído em atraso"),
            priority: text("Alta"),
            description: text("RAIS de 2024, entregue após inconsistências de dados."),
            responsible: person(2),
            company_deadline: text("2025-04-09"),
            reference_date: text("2024-12-01"),
            completed_at: text("2025-04-12T15:00:00Z"),
            ..Default::default()
        },
        RawActivity {
            id: "atv4".into(),
            title: "Reunião de Alinhamento Fiscal".into(),
            category: "Agenda".into(),
            subcategory: text("Alinhamento"),
            status: text("Em andamento"),
            priority: text("Baixa"),
            description: text("Reunião semanal da equipe fiscal."),
            responsible: person(9),
            starts_at: text("2025-07-10T14:00:00Z"),
            ends_at: text("2025-07-10T15:00:00Z"),
            ..Default::default()
        },
        RawActivity {
            id: "atv5".into(),
            title: "Pagamento GPS - Jun/25".into(),
            category: "Pagamento".into(),
            subcategory: text("Impostos Federais"),
            status: text("Pendente"),
            priority: text("Média"),
            description: text("Pagamento da GPS de junho. Aguardando aprovação."),
            responsible: person(7),
            company_deadline: text("2025-07-20"),
            reference_date: text("2025-06-01"),
            ..Default::default()
        },
        RawActivity {
            id: "atv6".into(),
            title: "Verificação de Apuração ICMS".into(),
            category: "Encaminhamento".into(),
            subcategory: text("Verificação de Apuração"),
            status: text("Em aberto"),
            priority: text("Alta"),
            description: text("Verificar a apuração do ICMS de maio/25 antes do envio."),
            responsible: person(3),
            requester: person(0),
            ..Default::default()
        },
        RawActivity {
            id: "atv7".into(),
            title: "Configuração de VPN".into(),
            category: "Encaminhamento".into(),
            subcategory: text("Suporte TI"),
            status: text("Pendente"),
            priority: text("Média"),
            description: text("Acesso VPN para novo colaborador."),
            responsible: person(4),
            requester: person(1),
            ..Default::default()
        },
        RawActivity {
            id: "atv8".into(),
            title: "Fechamento Contábil - Jul/25".into(),
            category: "Agenda".into(),
            subcategory: text("Fechamento"),
            status: text("Em andamento"),
            priority: text("Alta"),
            description: text("Processo de fechamento contábil mensal."),
            responsible: person(10),
            starts_at: text("2025-07-25T09:00:00Z"),
            ends_at: text("2025-07-30T18:00:00Z"),
            ..Default::default()
        },
        RawActivity {
            id: "atv9".into(),
            title: "Ajuste Contábil - Despesas".into(),
            category: "Encaminhamento".into(),
            subcategory: text("Ajuste Contábil"),
            status: text("Em aberto"),
            priority: text("Baixa"),
            description: text("Ajuste de despesas de viagem."),
            responsible: person(10),
            requester: person(6),
            ..Default::default()
        },
        RawActivity {
            id: "atv10".into(),
            title: "Pesquisa sobre Crédito de PIS/COFINS".into(),
            category: "Atividade Extra".into(),
            subcategory: text("Análise de Viabilidade"),
            status: text("Em andamento"),
            priority: text("Média"),
            description: text("Novas possibilidades de crédito de PIS/COFINS."),
            responsible: person(8),
            ..Default::default()
        },
    ];

    let activities = raw.into_iter().map(ActivityRecord::from).collect();

    Snapshot {
        collaborators,
        categories,
        activities,
    }
}

pub fn import_csv(store: &mut InMemoryStore, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        title: String,
        category: String,
        #[serde(default)]
        subcategory: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        responsible_id: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        reference_date: Option<String>,
        #[serde(default)]
        legal_deadline: Option<String>,
        #[serde(default)]
        company_deadline: Option<String>,
        #[serde(default)]
        completed_at: Option<String>,
        #[serde(default)]
        starts_at: Option<String>,
        #[serde(default)]
        ends_at: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;

        let responsible = match row.responsible_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => {
                let found = store.collaborator(id).cloned();
                if found.is_none() {
                    warn!(row = line + 1, responsible = id, "unknown collaborator; leaving unassigned");
                }
                found
            }
        };

        let record = ActivityRecord::from(RawActivity {
            id: String::new(),
            title: row.title,
            category: row.category,
            subcategory: row.subcategory,
            status: row.status,
            priority: row.priority,
            description: row.description,
            responsible,
            requester: None,
            reference_date: row.reference_date,
            legal_deadline: row.legal_deadline,
            company_deadline: row.company_deadline,
            completed_at: row.completed_at,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        });
        store.save_activity(record)?;
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use crate::store::{ActivityFilter, CategoryStore};
    use std::io::Write;

    #[test]
    fn seed_matches_the_demo_dataset() {
        let snapshot = seed_snapshot();
        assert_eq!(snapshot.collaborators.len(), 11);
        assert_eq!(snapshot.categories.len(), 6);
        assert_eq!(snapshot.activities.len(), 10);

        let rais = snapshot
            .activities
            .iter()
            .find(|a| a.id == "atv3")
            .unwrap();
        assert_eq!(rais.status, Status::CompletedLate);
        assert_eq!(rais.responsible_name(), "Carlos Pereira");
        assert!(rais.completed_at.is_some());

        let request = snapshot
            .activities
            .iter()
            .find(|a| a.id == "atv6")
            .unwrap();
        assert_eq!(
            request.requester.as_ref().map(|c| c.name.as_str()),
            Some("João Silva")
        );
    }

    #[test]
    fn data_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = InMemoryStore::from_snapshot(seed_snapshot());

        write_store(&path, &store).unwrap();
        let loaded = load_store(&path).unwrap();
        assert_eq!(loaded.to_snapshot(), store.to_snapshot());
        assert_eq!(loaded.categories().len(), 6);
    }

    #[test]
    fn loads_legacy_portuguese_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{
                "colaboradores": [{ "id": "user1", "NomeCompleto": "João Silva" }],
                "categorias": [{ "id": "cat1", "nome": "Obrigações", "subcategorias": ["DCTF"] }],
                "atividades": [{
                    "id": "atv1",
                    "titulo": "DCTF",
                    "categoria": "Obrigações",
                    "status": "Pendente",
                    "PrazoLimiteEmpresa": "not a date"
                }]
            }"#,
        )
        .unwrap();

        let store = load_store(&path).unwrap();
        let activity = store.activity("atv1").unwrap();
        assert_eq!(activity.company_deadline, None);
        assert_eq!(store.collaborators()[0].name, "João Silva");
    }

    #[test]
    fn non_string_date_keeps_the_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.json");
        std::fs::write(
            &path,
            r#"{
                "collaborators": [{ "id": "user1", "name": "João Silva" }],
                "activities": [
                    { "id": "ok", "title": "GIA ST", "category": "Obrigações", "companyDeadline": "2025-06-17" },
                    { "id": "bad", "title": "DCTF", "category": "Obrigações", "companyDeadline": 20250617, "responsavel_FK": "user1" }
                ]
            }"#,
        )
        .unwrap();

        let store = load_store(&path).unwrap();
        assert_eq!(
            store.activity("ok").unwrap().company_deadline,
            chrono::NaiveDate::from_ymd_opt(2025, 6, 17)
        );
        let bad = store.activity("bad").unwrap();
        assert_eq!(bad.company_deadline, None);
        assert_eq!(bad.responsible_name(), "João Silva");
    }

    #[test]
    fn missing_data_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_store(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("run `seed`"));
    }

    #[test]
    fn imports_csv_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "title,category,subcategory,status,priority,responsible_id,description,reference_date,legal_deadline,company_deadline,completed_at,starts_at,ends_at"
        )
        .unwrap();
        writeln!(
            file,
            "DCTF - Jul/25,Obrigações,DCTF,Pendente,Alta,user1,,2025-07-01,2025-08-22,2025-08-15,,,"
        )
        .unwrap();
        writeln!(
            file,
            "ECF 2024,Obrigações,ECF,Concluído,,ghost,,2024-12-01,,2025-07-31,2025-07-20,,"
        )
        .unwrap();

        let mut store = InMemoryStore::from_snapshot(seed_snapshot());
        let inserted = import_csv(&mut store, file.path()).unwrap();
        assert_eq!(inserted, 2);

        let imported = store.activities(&ActivityFilter {
            search: Some("DCTF - Jul".to_string()),
            ..Default::default()
        });
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].responsible_name(), "João Silva");
        assert_eq!(imported[0].status, Status::Pending);
        assert!(imported[0].id.starts_with("atv-"));

        let ecf = store.activities(&ActivityFilter {
            search: Some("ECF 2024".to_string()),
            ..Default::default()
        });
        assert!(ecf[0].responsible.is_none());
        assert!(ecf[0].completed_at.is_some());
    }
}
