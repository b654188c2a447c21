use pdfseal_core::document::{Document, StampRequest};
use pdfseal_core::mode::SignatureModeConfig;
use tracing::debug;

use crate::errors::ValidationError;

/// `add_signature` 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Appended,
    /// 批量模式下首页签名替换整个列表，复制到除最后一页外的所有页面。
    Replicated { copies: usize },
    /// 批量模式下最后一页的独立签名。
    LastPage,
}

/// 判断模式是否适用于给定页数的文档。
pub fn validate_for_document(config: &SignatureModeConfig, total_pages: usize) -> bool {
    if total_pages < 1 {
        return false;
    }
    match config {
        SignatureModeConfig::Free => true,
        SignatureModeConfig::Mass => total_pages >= 2,
        SignatureModeConfig::Template { interval, .. } => {
            *interval >= 1 && total_pages >= *interval
        }
        SignatureModeConfig::Selective { affected, .. } => {
            affected.iter().all(|page| *page < total_pages)
        }
    }
}

/// 需要签名的页面（升序）。模式不适用时返回空集。
pub fn pages_to_sign(config: &SignatureModeConfig, total_pages: usize) -> Vec<usize> {
    if !validate_for_document(config, total_pages) {
        return Vec::new();
    }
    match config {
        SignatureModeConfig::Free => (0..total_pages).collect(),
        SignatureModeConfig::Mass => (0..total_pages - 1).collect(),
        SignatureModeConfig::Template { interval, .. } => {
            (0..total_pages).step_by(*interval).collect()
        }
        SignatureModeConfig::Selective { affected, excluded } => {
            affected.difference(excluded).copied().collect()
        }
    }
}

/// 按文档当前模式添加签名。失败时文档保持不变。
pub fn add_signature(
    document: &mut Document,
    signature: StampRequest,
) -> Result<AddOutcome, ValidationError> {
    document.validate_signature(&signature)?;
    let total_pages = document.total_pages();

    match document.mode_config() {
        SignatureModeConfig::Mass => {
            if !validate_for_document(&SignatureModeConfig::Mass, total_pages) {
                return Err(ValidationError::ModeNotApplicable {
                    mode: document.mode_config().kind(),
                    total_pages,
                });
            }
            if signature.page_index == 0 {
                let copies = mass_copies(&signature, total_pages);
                let count = copies.len();
                document.replace_signatures(copies)?;
                debug!(copies = count, "批量模式：首页签名已复制");
                Ok(AddOutcome::Replicated { copies: count })
            } else if signature.page_index == total_pages - 1 {
                document.add_signature(signature)?;
                Ok(AddOutcome::LastPage)
            } else {
                Err(ValidationError::UndefinedMassPage {
                    page: signature.page_index,
                    total_pages,
                })
            }
        }
        _ => {
            document.add_signature(signature)?;
            Ok(AddOutcome::Appended)
        }
    }
}

fn mass_copies(signature: &StampRequest, total_pages: usize) -> Vec<StampRequest> {
    (0..total_pages - 1)
        .map(|page| signature.on_page(page))
        .collect()
}

/// 由一次签名推导实际落到各页的全部摆放。
///
/// 自由模式只保留签名本身；批量模式遵循 [`add_signature`] 的复制规则；
/// 模板与选择模式在 [`pages_to_sign`] 的每一页各放一份。
pub fn plan_placements(
    config: &SignatureModeConfig,
    total_pages: usize,
    signature: &StampRequest,
) -> Result<Vec<StampRequest>, ValidationError> {
    if !validate_for_document(config, total_pages) {
        return Err(ValidationError::ModeNotApplicable {
            mode: config.kind(),
            total_pages,
        });
    }
    if signature.page_index >= total_pages {
        return Err(pdfseal_core::document::DocumentError::InvalidPageIndex {
            page: signature.page_index,
            total_pages,
        }
        .into());
    }

    match config {
        SignatureModeConfig::Free => Ok(vec![signature.clone()]),
        SignatureModeConfig::Mass => {
            if signature.page_index == 0 {
                Ok(mass_copies(signature, total_pages))
            } else if signature.page_index == total_pages - 1 {
                Ok(vec![signature.clone()])
            } else {
                Err(ValidationError::UndefinedMassPage {
                    page: signature.page_index,
                    total_pages,
                })
            }
        }
        SignatureModeConfig::Template { .. } | SignatureModeConfig::Selective { .. } => {
            Ok(pages_to_sign(config, total_pages)
                .into_iter()
                .map(|page| signature.on_page(page))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use pdfseal_core::document::PageGeometry;
    use pdfseal_core::geometry::{Point2, Size2};

    use super::*;

    fn document(pages: usize, mode: SignatureModeConfig) -> Document {
        let page = PageGeometry::new(595.0, 842.0).unwrap();
        let mut doc = Document::new("contract.pdf", vec![page; pages]);
        doc.replace_mode_config(mode);
        doc
    }

    fn signature(page: usize) -> StampRequest {
        StampRequest::new("firma.png", page, Point2::new(320.0, 700.0), Size2::new(100.0, 50.0))
    }

    #[test]
    fn pages_to_sign_per_mode() {
        assert_eq!(pages_to_sign(&SignatureModeConfig::Free, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(pages_to_sign(&SignatureModeConfig::Mass, 5), vec![0, 1, 2, 3]);
        assert_eq!(pages_to_sign(&SignatureModeConfig::template(2), 5), vec![0, 2, 4]);
        assert_eq!(
            pages_to_sign(&SignatureModeConfig::selective([1, 3], [3]), 5),
            vec![1]
        );
    }

    #[test]
    fn invalid_configurations_sign_nothing() {
        assert!(pages_to_sign(&SignatureModeConfig::Mass, 1).is_empty());
        assert!(pages_to_sign(&SignatureModeConfig::template(6), 5).is_empty());
        assert!(pages_to_sign(&SignatureModeConfig::template(0), 5).is_empty());
        assert!(pages_to_sign(&SignatureModeConfig::selective([1, 7], []), 5).is_empty());
        assert!(pages_to_sign(&SignatureModeConfig::Free, 0).is_empty());
    }

    #[test]
    fn validate_for_document_rules() {
        assert!(!validate_for_document(&SignatureModeConfig::Mass, 1));
        assert!(validate_for_document(&SignatureModeConfig::Mass, 2));
        assert!(validate_for_document(&SignatureModeConfig::Free, 1));
        assert!(!validate_for_document(&SignatureModeConfig::Free, 0));
        assert!(validate_for_document(&SignatureModeConfig::template(3), 3));
        assert!(!validate_for_document(&SignatureModeConfig::template(4), 3));
        assert!(validate_for_document(&SignatureModeConfig::selective([0, 2], []), 3));
        assert!(!validate_for_document(&SignatureModeConfig::selective([3], []), 3));
    }

    #[test]
    fn mass_mode_replicates_first_page_and_appends_last() {
        let mut doc = document(5, SignatureModeConfig::Mass);

        let outcome = add_signature(&mut doc, signature(0)).unwrap();
        assert_eq!(outcome, AddOutcome::Replicated { copies: 4 });
        assert_eq!(doc.signatures().len(), 4);
        for (index, stored) in doc.signatures().iter().enumerate() {
            assert_eq!(stored.page_index, index);
            assert_eq!(stored.image, signature(0).image);
            assert_eq!(stored.position, signature(0).position);
            assert_eq!(stored.size, signature(0).size);
        }

        let mut last = signature(4);
        last.position = Point2::new(50.0, 60.0);
        let outcome = add_signature(&mut doc, last.clone()).unwrap();
        assert_eq!(outcome, AddOutcome::LastPage);
        assert_eq!(doc.signatures().len(), 5);
        assert_eq!(doc.signatures()[4], last);
    }

    #[test]
    fn mass_mode_rejects_middle_pages_and_short_documents() {
        let mut doc = document(5, SignatureModeConfig::Mass);
        let err = add_signature(&mut doc, signature(2)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UndefinedMassPage {
                page: 2,
                total_pages: 5
            }
        ));
        assert!(doc.signatures().is_empty());

        let mut single = document(1, SignatureModeConfig::Mass);
        let err = add_signature(&mut single, signature(0)).unwrap_err();
        assert!(matches!(err, ValidationError::ModeNotApplicable { .. }));
    }

    #[test]
    fn other_modes_append_without_replication() {
        for mode in [
            SignatureModeConfig::Free,
            SignatureModeConfig::template(2),
            SignatureModeConfig::selective([1], []),
        ] {
            let mut doc = document(4, mode);
            assert_eq!(add_signature(&mut doc, signature(1)).unwrap(), AddOutcome::Appended);
            assert_eq!(add_signature(&mut doc, signature(1)).unwrap(), AddOutcome::Appended);
            assert_eq!(doc.signatures().len(), 2);
        }
    }

    #[test]
    fn out_of_range_signature_is_rejected_before_mutation() {
        let mut doc = document(2, SignatureModeConfig::Free);
        let err = add_signature(&mut doc, signature(2)).unwrap_err();
        assert!(matches!(err, ValidationError::Document(_)));
        assert!(doc.signatures().is_empty());
    }

    #[test]
    fn plan_placements_expands_each_mode() {
        let free = plan_placements(&SignatureModeConfig::Free, 5, &signature(3)).unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].page_index, 3);

        let mass = plan_placements(&SignatureModeConfig::Mass, 5, &signature(0)).unwrap();
        assert_eq!(mass.iter().map(|s| s.page_index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let template =
            plan_placements(&SignatureModeConfig::template(2), 5, &signature(0)).unwrap();
        assert_eq!(
            template.iter().map(|s| s.page_index).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );

        let selective = plan_placements(
            &SignatureModeConfig::selective([1, 3, 4], [4]),
            5,
            &signature(0),
        )
        .unwrap();
        assert_eq!(
            selective.iter().map(|s| s.page_index).collect::<Vec<_>>(),
            vec![1, 3]
        );

        assert!(matches!(
            plan_placements(&SignatureModeConfig::Mass, 1, &signature(0)),
            Err(ValidationError::ModeNotApplicable { .. })
        ));
    }
}
