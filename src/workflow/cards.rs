//! Saved-card list with optional selection and an inline "add card" form

use std::sync::Arc;

use uuid::Uuid;

use super::api::{PortalApi, WorkflowError};
use super::form::PaymentMethodForm;
use crate::models::Currency;
use crate::payment_method::{BillingInfo, PaymentMethod};

type SelectListener = Box<dyn FnMut(&PaymentMethod) + Send>;

pub struct CardManager {
    api: Arc<dyn PortalApi>,
    context_currency: Currency,
    cards: Vec<PaymentMethod>,
    selected: Option<Uuid>,
    select_mode: bool,
    on_select: Option<SelectListener>,
    form: Option<PaymentMethodForm>,
    error: Option<String>,
}

impl CardManager {
    pub fn new(api: Arc<dyn PortalApi>, context_currency: Currency) -> Self {
        Self {
            api,
            context_currency,
            cards: Vec::new(),
            selected: None,
            select_mode: false,
            on_select: None,
            form: None,
            error: None,
        }
    }

    /// Turn on select mode; `listener` fires whenever a card is picked
    pub fn selectable(mut self, listener: impl FnMut(&PaymentMethod) + Send + 'static) -> Self {
        self.select_mode = true;
        self.on_select = Some(Box::new(listener));
        self
    }

    pub fn with_select_mode(mut self) -> Self {
        self.select_mode = true;
        self
    }

    /// Reload the current user's cards. A selection that no longer exists
    /// is dropped.
    pub async fn fetch_cards(&mut self) -> Result<&[PaymentMethod], WorkflowError> {
        match self.api.list_payment_methods().await {
            Ok(cards) => {
                self.cards = cards;
                self.error = None;
                if let Some(id) = self.selected {
                    if !self.cards.iter().any(|c| c.id == id) {
                        self.selected = None;
                    }
                }
                Ok(&self.cards)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn cards(&self) -> &[PaymentMethod] {
        &self.cards
    }

    pub fn is_select_mode(&self) -> bool {
        self.select_mode
    }

    pub fn select(&mut self, id: Uuid) -> Result<&PaymentMethod, WorkflowError> {
        if !self.select_mode {
            return Err(WorkflowError::Validation(
                "Card selection is not enabled".to_string(),
            ));
        }
        let card = self
            .cards
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| WorkflowError::Validation("Unknown payment method".to_string()))?;
        self.selected = Some(id);
        if let Some(listener) = self.on_select.as_mut() {
            listener(card);
        }
        Ok(card)
    }

    pub fn selected(&self) -> Option<&PaymentMethod> {
        let id = self.selected?;
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.selected == Some(id)
    }

    /// Reveal the inline add-card form
    pub fn begin_add(&mut self) -> &mut PaymentMethodForm {
        let currency = self.context_currency;
        self.form
            .get_or_insert_with(|| PaymentMethodForm::new(currency))
    }

    /// Swap in a preconfigured form (e.g. with the currency selector shown)
    pub fn begin_add_with(&mut self, form: PaymentMethodForm) -> &mut PaymentMethodForm {
        self.form.insert(form)
    }

    pub fn form(&self) -> Option<&PaymentMethodForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut PaymentMethodForm> {
        self.form.as_mut()
    }

    pub fn cancel_add(&mut self) {
        self.form = None;
    }

    /// Persist the card in the add form, reload the list and close the form.
    /// In select mode the new card becomes the selection.
    pub async fn save_new(
        &mut self,
        billing: Option<BillingInfo>,
    ) -> Result<PaymentMethod, WorkflowError> {
        let form = self
            .form
            .as_mut()
            .ok_or_else(|| WorkflowError::Validation("No card is being added".to_string()))?;
        if !form.touch_all() {
            return Err(WorkflowError::Validation(
                "Please correct the highlighted card details".to_string(),
            ));
        }
        let draft = form
            .draft()
            .ok_or_else(|| WorkflowError::Validation("Card details are incomplete".to_string()))?;

        let saved = match self.api.create_payment_method(&draft.into_request(billing)).await {
            Ok(saved) => saved,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };
        tracing::debug!(payment_method_id = %saved.id, "Card saved");

        self.form = None;
        self.fetch_cards().await?;
        if self.select_mode {
            self.select(saved.id)?;
        }
        Ok(saved)
    }

    pub fn edit(&mut self, _id: Uuid) -> Result<(), WorkflowError> {
        Err(WorkflowError::NotSupported("Editing a saved card"))
    }

    pub fn delete(&mut self, _id: Uuid) -> Result<(), WorkflowError> {
        Err(WorkflowError::NotSupported("Removing a saved card"))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
